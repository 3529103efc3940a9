//! Merge executor: writes the planned pieces into an output stream, then
//! re-scans the result.
//!
//! The output is written in place at the path the caller supplies. A failed
//! run leaves a partial file behind; callers that need atomic replacement
//! must write to a temporary path and rename on success.

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::plan::{self, Plan, SourceCounts, SourceId};
use crate::progress::Progress;
use crate::scan;
use crate::verify;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default)]
pub struct MergeOptions {
    /// Hash the origin and candidates on the rayon pool.
    pub parallel_scan: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MergeReport {
    pub total_pieces: usize,
    pub matched_pieces: usize,
    pub unmatched_indices: Vec<usize>,
    pub bytes_written: u64,
    /// Which source the plan picked for each piece.
    pub planned: SourceCounts,
    pub started_utc: String,
    pub finished_utc: String,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched_indices.is_empty() && self.matched_pieces == self.total_pieces
    }
}

/// Copy every piece of `plan` from its selected source into `output`, in
/// increasing index order. Returns bytes written.
///
/// Each piece is read from offset `index * piece_size` of its source. A
/// source that ends early is zero-filled up to the expected piece length so
/// later pieces stay aligned and the output is always `total_size` bytes.
pub fn execute<R: Read + Seek, W: Write>(
    plan: &Plan,
    piece_size: u64,
    total_size: u64,
    origin: &mut R,
    candidates: &mut [R],
    output: &mut W,
    progress: Option<&Progress>,
) -> Result<u64> {
    if piece_size == 0 {
        return Err(Error::InvalidPieceSize);
    }
    let n_candidates = candidates.len();
    let mut written = 0u64;
    for (i, sel) in plan.selections().iter().enumerate() {
        let offset = (i as u64).saturating_mul(piece_size);
        let want = total_size.saturating_sub(offset).min(piece_size);
        let src: &mut R = match sel.read_from() {
            SourceId::Origin => &mut *origin,
            SourceId::Candidate(ci) => candidates
                .get_mut(ci)
                .ok_or(Error::IndexOutOfRange { index: ci, len: n_candidates })?,
        };
        src.seek(SeekFrom::Start(offset))?;
        let n = io::copy(&mut (&mut *src).take(want), output)?;
        if n < want {
            warn!(piece = i, got = n, want, source = ?sel.read_from(), "short read, zero-filling");
            io::copy(&mut io::repeat(0).take(want - n), output)?;
        }
        written += want;
        if let Some(p) = progress {
            p.inc_piece();
            p.add_bytes(want);
        }
    }
    output.flush()?;
    Ok(written)
}

/// Full run from paths: scan origin and candidates, plan, write `output`,
/// re-scan it and grade it against the manifest.
pub fn merge_files(
    mf: &Manifest,
    origin: &Path,
    candidates: &[PathBuf],
    output: &Path,
    opts: &MergeOptions,
    progress: &Progress,
) -> Result<MergeReport> {
    let started_utc = chrono::Utc::now().to_rfc3339();
    let piece_size = mf.piece_length();
    let pieces = mf.pieces().len() as u64;

    progress.set_stage("scan origin", pieces);
    let origin_table = scan::scan_path_with_progress(origin, piece_size, Some(progress))?;

    progress.set_stage("scan sources", pieces * candidates.len() as u64);
    let tables = scan::scan_all(candidates, piece_size, opts.parallel_scan, Some(progress))?;

    let refs: Vec<_> = tables.iter().collect();
    let plan = plan::plan(mf.pieces(), &origin_table, &refs);
    let planned = plan.source_counts(candidates.len());
    debug!(
        origin = planned.origin,
        candidates = ?planned.candidates,
        unmatched = planned.unmatched,
        "planned"
    );

    progress.set_stage("merge", pieces);
    let bytes_written = {
        let mut origin_r = BufReader::new(File::open(origin)?);
        let mut cand_r = candidates
            .iter()
            .map(|p| File::open(p).map(BufReader::new))
            .collect::<std::io::Result<Vec<_>>>()?;
        let mut out = BufWriter::new(File::create(output)?);
        let n = execute(
            &plan,
            piece_size,
            mf.total_size(),
            &mut origin_r,
            &mut cand_r,
            &mut out,
            Some(progress),
        )?;
        out.get_ref().sync_all()?;
        n
    };

    progress.set_stage("verify output", pieces);
    let written_table = scan::scan_path_with_progress(output, piece_size, Some(progress))?;
    let vr = verify::compare(mf.pieces(), &written_table);

    let report = MergeReport {
        total_pieces: vr.expected_pieces,
        matched_pieces: vr.pieces_ok,
        unmatched_indices: vr.bad_indices,
        bytes_written,
        planned,
        started_utc,
        finished_utc: chrono::Utc::now().to_rfc3339(),
    };
    if report.is_complete() {
        info!(pieces = report.total_pieces, bytes = bytes_written, "merge complete");
    } else {
        warn!(
            matched = report.matched_pieces,
            total = report.total_pieces,
            unmatched = report.unmatched_indices.len(),
            "merge incomplete"
        );
    }
    Ok(report)
}
