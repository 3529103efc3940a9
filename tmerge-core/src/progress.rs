use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Shared counters for a long scan or merge, optionally reported from a
/// background thread every `interval`.
#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    interval: Duration,
    stage: Arc<Mutex<String>>,
    pieces_done: Arc<AtomicU64>,
    pieces_total: Arc<AtomicU64>,
    bytes_done: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self::with_interval(enabled, Duration::from_secs(5))
    }

    pub fn with_interval(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval,
            stage: Arc::new(Mutex::new(String::new())),
            pieces_done: Arc::new(AtomicU64::new(0)),
            pieces_total: Arc::new(AtomicU64::new(0)),
            bytes_done: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Switch stage and reset counters.
    pub fn set_stage(&self, s: &str, pieces_total: u64) {
        if let Ok(mut g) = self.stage.lock() {
            *g = s.to_string();
        }
        self.pieces_total.store(pieces_total, Ordering::Relaxed);
        self.pieces_done.store(0, Ordering::Relaxed);
        self.bytes_done.store(0, Ordering::Relaxed);
    }

    pub fn inc_piece(&self) {
        self.pieces_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn pieces_done(&self) -> u64 {
        self.pieces_done.load(Ordering::Relaxed)
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        self.running.store(true, Ordering::Relaxed);
        let this = self.clone();
        thread::spawn(move || {
            let t0 = Instant::now();
            while this.running.load(Ordering::Relaxed) {
                thread::sleep(this.interval);
                if !this.running.load(Ordering::Relaxed) {
                    break;
                }
                let stage = this.stage.lock().map(|g| g.clone()).unwrap_or_default();
                let done = this.pieces_done();
                let total = this.pieces_total.load(Ordering::Relaxed);
                let pct = if total > 0 { done as f64 / total as f64 * 100.0 } else { 0.0 };
                info!(
                    elapsed_s = t0.elapsed().as_secs(),
                    stage = %stage,
                    pieces = done,
                    pieces_total = total,
                    bytes = this.bytes_done(),
                    "progress {:.0}%",
                    pct
                );
            }
        });
    }

    pub fn stop(&self) {
        if self.enabled {
            self.running.store(false, Ordering::Relaxed);
        }
    }
}
