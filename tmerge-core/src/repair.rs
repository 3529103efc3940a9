use crate::error::Result;
use crate::manifest::Manifest;
use crate::merge::{self, MergeOptions, MergeReport};
use crate::pieces::to_hex;
use crate::progress::Progress;
use std::path::{Path, PathBuf};
use tracing::info;

/// Inputs of one repair run.
#[derive(Clone, Debug)]
pub struct RepairConfig {
    /// Preferred source; supplies every piece it already has right.
    pub origin: PathBuf,
    /// Fallback sources, highest priority first.
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
    pub parallel_scan: bool,
    pub progress: bool,
}

/// Load the manifest at `manifest_path` and rebuild `cfg.output` from the
/// origin and sources. Any error aborts the whole run.
pub fn run(manifest_path: &Path, cfg: &RepairConfig) -> Result<MergeReport> {
    let mf = Manifest::open(manifest_path)?;
    info!(
        name = mf.name(),
        info_hash = %to_hex(&mf.info_hash()),
        pieces = mf.pieces().len(),
        piece_length = mf.piece_length(),
        sources = cfg.sources.len(),
        "loaded manifest"
    );
    let prog = Progress::new(cfg.progress);
    prog.start();
    let res = merge::merge_files(
        &mf,
        &cfg.origin,
        &cfg.sources,
        &cfg.output,
        &MergeOptions { parallel_scan: cfg.parallel_scan },
        &prog,
    );
    prog.stop();
    res
}
