use crate::error::Result;
use crate::manifest::Manifest;
use crate::pieces::PieceTable;
use crate::progress::Progress;
use crate::scan;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub expected_pieces: usize,
    pub scanned_pieces: usize,
    pub pieces_ok: usize,
    pub pieces_bad: usize,
    pub bad_indices: Vec<usize>,
}

impl VerifyReport {
    pub fn is_complete(&self) -> bool {
        self.pieces_bad == 0 && self.scanned_pieces == self.expected_pieces
    }
}

/// Grade `scanned` against `authoritative`. Only authoritative indices are
/// graded; a missing piece counts as bad.
pub fn compare(authoritative: &PieceTable, scanned: &PieceTable) -> VerifyReport {
    let expected = authoritative.len();
    let bad_indices: Vec<usize> = authoritative
        .compare_with(scanned)
        .into_iter()
        .take(expected)
        .enumerate()
        .filter(|(_, ok)| !ok)
        .map(|(i, _)| i)
        .collect();
    VerifyReport {
        expected_pieces: expected,
        scanned_pieces: scanned.len(),
        pieces_ok: expected - bad_indices.len(),
        pieces_bad: bad_indices.len(),
        bad_indices,
    }
}

/// Scan `path` and grade every piece against the manifest.
pub fn verify_file(mf: &Manifest, path: &Path, progress: &Progress) -> Result<VerifyReport> {
    progress.set_stage("verify", mf.pieces().len() as u64);
    let table = scan::scan_path_with_progress(path, mf.piece_length(), Some(progress))?;
    let report = compare(mf.pieces(), &table);
    debug!(
        path = %path.display(),
        ok = report.pieces_ok,
        bad = report.pieces_bad,
        "verified"
    );
    Ok(report)
}
