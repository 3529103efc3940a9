use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

use tmerge_core::manifest::{FileEntry, Manifest};
use tmerge_core::merge::MergeReport;
use tmerge_core::pieces::to_hex;
use tmerge_core::progress::Progress;
use tmerge_core::repair::{self, RepairConfig};
use tmerge_core::verify::{self, VerifyReport};

/// Exit status when the run finished but some pieces have no valid source.
const EXIT_INCOMPLETE: u8 = 2;

#[derive(Parser)]
#[command(name = "tmerge", version, about = "Verify and rebuild files against a .torrent piece table")]
struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. "info", "tmerge_core=debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print manifest metadata
    Info {
        manifest: PathBuf,
        #[arg(long)] json: bool,
    },
    /// Check a file against the manifest's piece digests
    Verify {
        manifest: PathBuf,
        file: PathBuf,
        #[arg(long)] json: bool,
        #[arg(long)] progress: bool,
    },
    /// Rebuild a file from an origin plus fallback sources
    Merge {
        manifest: PathBuf,
        #[arg(long)] origin: PathBuf,
        /// Fallback source; repeat in priority order
        #[arg(long = "source")] sources: Vec<PathBuf>,
        /// Directory of extra fallback sources, taken after --source in path order
        #[arg(long)] source_dir: Option<PathBuf>,
        #[arg(long)] include: Vec<String>,
        #[arg(long)] exclude: Vec<String>,
        #[arg(long)] output: PathBuf,
        /// Keep the output even if some pieces could not be repaired
        #[arg(long)] keep_incomplete: bool,
        #[arg(long)] parallel: bool,
        #[arg(long)] progress: bool,
        #[arg(long)] json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);
    let complete = match cli.cmd {
        Cmd::Info { manifest, json } => info(&manifest, json)?,
        Cmd::Verify { manifest, file, json, progress } => verify(&manifest, &file, json, progress)?,
        Cmd::Merge { manifest, origin, sources, source_dir, include, exclude, output, keep_incomplete, parallel, progress, json } => {
            let mut all = sources;
            if let Some(dir) = source_dir {
                let skip = [origin.as_path(), output.as_path()];
                all.extend(list_sources(&dir, &include, &exclude, &skip)?);
            }
            tracing::debug!(sources = ?all, "candidate sources in priority order");
            let cfg = RepairConfig { origin, sources: all, output, parallel_scan: parallel, progress };
            merge(&manifest, &cfg, keep_incomplete, json)?
        }
    };
    Ok(if complete { ExitCode::SUCCESS } else { ExitCode::from(EXIT_INCOMPLETE) })
}

/// Respects `RUST_LOG` if set, otherwise uses `level`. Logs go to stderr;
/// stdout carries only reports.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_globset(includes: &[String], excludes: &[String]) -> Result<(globset::GlobSet, globset::GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() { incb.add(Glob::new("**/*")?); }
    for g in includes { incb.add(Glob::new(g)?); }
    for g in excludes { excb.add(Glob::new(g)?); }
    Ok((incb.build()?, excb.build()?))
}

/// Regular files under `dir` matching the globs (relative to `dir`), sorted
/// so source priority is stable between runs.
fn list_sources(dir: &Path, includes: &[String], excludes: &[String], skip: &[&Path]) -> Result<Vec<PathBuf>> {
    let (inc, exc) = build_globset(includes, excludes)?;
    let skip: Vec<PathBuf> = skip.iter().filter_map(|p| p.canonicalize().ok()).collect();
    let mut v = vec![];
    for e in WalkDir::new(dir).min_depth(1) {
        let e = e.with_context(|| format!("walk {}", dir.display()))?;
        if !e.file_type().is_file() { continue; }
        let path = e.path();
        let rel = path.strip_prefix(dir).unwrap_or(path).to_string_lossy().replace('\\', "/");
        if !inc.is_match(&rel) || exc.is_match(&rel) { continue; }
        if let Ok(c) = path.canonicalize() {
            if skip.contains(&c) { continue; }
        }
        v.push(path.to_path_buf());
    }
    v.sort();
    Ok(v)
}

#[derive(Serialize)]
struct InfoOut<'a> {
    name: &'a str,
    announce: Option<&'a str>,
    info_hash: String,
    piece_length: u64,
    pieces: usize,
    total_size: u64,
    single_file: bool,
    files: &'a [FileEntry],
}

fn info(manifest: &Path, json: bool) -> Result<bool> {
    let mf = Manifest::open(manifest).with_context(|| format!("load {}", manifest.display()))?;
    let out = InfoOut {
        name: mf.name(),
        announce: mf.announce(),
        info_hash: to_hex(&mf.info_hash()),
        piece_length: mf.piece_length(),
        pieces: mf.pieces().len(),
        total_size: mf.total_size(),
        single_file: mf.is_single_file(),
        files: mf.files(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(true);
    }
    println!("name: {}", out.name);
    if let Some(a) = out.announce { println!("announce: {}", a); }
    println!("info hash: {}", out.info_hash);
    println!("piece length: {}", out.piece_length);
    println!("pieces: {}", out.pieces);
    println!("total size: {}", out.total_size);
    println!("files:");
    for (idx, f) in out.files.iter().enumerate() {
        println!("  {}: {} ({})", idx, f.rel_path, f.size);
    }
    Ok(true)
}

fn verify(manifest: &Path, file: &Path, json: bool, show_progress: bool) -> Result<bool> {
    let mf = Manifest::open(manifest).with_context(|| format!("load {}", manifest.display()))?;
    let prog = Progress::new(show_progress);
    prog.start();
    let vr = verify::verify_file(&mf, file, &prog).with_context(|| format!("scan {}", file.display()));
    prog.stop();
    let vr = vr?;
    if json {
        println!("{}", serde_json::to_string_pretty(&vr)?);
    } else {
        print_verify(&vr);
    }
    Ok(vr.is_complete())
}

fn print_verify(vr: &VerifyReport) {
    eprintln!("Pieces ok={}, bad={} (expected {}, scanned {})", vr.pieces_ok, vr.pieces_bad, vr.expected_pieces, vr.scanned_pieces);
    if !vr.bad_indices.is_empty() { eprintln!("Bad pieces: {}", join_indices(&vr.bad_indices)); }
    if vr.is_complete() { println!("OK"); } else { println!("BAD"); }
}

fn merge(manifest: &Path, cfg: &RepairConfig, keep_incomplete: bool, json: bool) -> Result<bool> {
    // Written beside the target and renamed into place only on success.
    let parent = match cfg.output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = tempfile::Builder::new().prefix(".tmerge-").suffix(".part").tempfile_in(&parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    let run_cfg = RepairConfig { output: tmp.path().to_path_buf(), ..cfg.clone() };
    let report = repair::run(manifest, &run_cfg).context("merge failed")?;

    let complete = report.is_complete();
    if complete || keep_incomplete {
        tmp.persist(&cfg.output).with_context(|| format!("rename into {}", cfg.output.display()))?;
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_merge(&report, &cfg.output, complete || keep_incomplete);
    }
    Ok(complete)
}

fn print_merge(r: &MergeReport, output: &Path, kept: bool) {
    let pct = if r.total_pieces > 0 { 100.0 * r.matched_pieces as f64 / r.total_pieces as f64 } else { 100.0 };
    eprintln!("Plan: origin={} sources={:?} unmatched={}", r.planned.origin, r.planned.candidates, r.planned.unmatched);
    eprintln!("Matched {}/{} pieces ({:.1}%), {} bytes written", r.matched_pieces, r.total_pieces, pct, r.bytes_written);
    if !r.unmatched_indices.is_empty() { eprintln!("Unmatched pieces: {}", join_indices(&r.unmatched_indices)); }
    if !kept { eprintln!("Output discarded (use --keep-incomplete to keep it)"); }
    else { eprintln!("Wrote {}", output.display()); }
    if r.is_complete() { println!("OK"); } else { println!("INCOMPLETE"); }
}

fn join_indices(v: &[usize]) -> String {
    const MAX: usize = 32;
    let mut s = v.iter().take(MAX).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    if v.len() > MAX { s.push_str(&format!(",... ({} total)", v.len())); }
    s
}
