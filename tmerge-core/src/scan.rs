use crate::error::{Error, Result};
use crate::pieces::PieceTable;
use crate::progress::Progress;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hash `reader` in `piece_size` windows starting at `start_offset`.
///
/// A short final window is hashed and kept as the last entry. The reader's
/// position is left wherever the scan stopped.
pub fn scan<R: Read + Seek>(
    reader: &mut R,
    piece_size: u64,
    start_offset: u64,
) -> Result<PieceTable> {
    scan_with_progress(reader, piece_size, start_offset, None)
}

pub fn scan_with_progress<R: Read + Seek>(
    reader: &mut R,
    piece_size: u64,
    start_offset: u64,
    progress: Option<&Progress>,
) -> Result<PieceTable> {
    if piece_size == 0 {
        return Err(Error::InvalidPieceSize);
    }
    reader.seek(SeekFrom::Start(start_offset))?;
    let mut table = PieceTable::default();
    // Windows are streamed through the hasher; nothing is sized by `piece_size`.
    loop {
        let mut hasher = Sha1::new();
        let n = io::copy(&mut (&mut *reader).take(piece_size), &mut hasher)?;
        if n == 0 {
            break;
        }
        let d: [u8; 20] = hasher.finalize().into();
        table.push(&d);
        if let Some(p) = progress {
            p.inc_piece();
            p.add_bytes(n);
        }
        if n < piece_size {
            break;
        }
    }
    Ok(table)
}

/// Open, scan from the start and close `path`.
pub fn scan_path(path: &Path, piece_size: u64) -> Result<PieceTable> {
    scan_path_with_progress(path, piece_size, None)
}

pub fn scan_path_with_progress(
    path: &Path,
    piece_size: u64,
    progress: Option<&Progress>,
) -> Result<PieceTable> {
    let f = File::open(path)?;
    let mut reader = BufReader::new(f);
    let table = scan_with_progress(&mut reader, piece_size, 0, progress)?;
    debug!(path = %path.display(), pieces = table.len(), "scanned");
    Ok(table)
}

/// Scan several files, returning tables in input order. With `parallel`
/// each file is hashed on the rayon pool.
pub fn scan_all(
    paths: &[PathBuf],
    piece_size: u64,
    parallel: bool,
    progress: Option<&Progress>,
) -> Result<Vec<PieceTable>> {
    if parallel {
        use rayon::prelude::*;
        paths.par_iter().map(|p| scan_path_with_progress(p, piece_size, progress)).collect()
    } else {
        paths.iter().map(|p| scan_path_with_progress(p, piece_size, progress)).collect()
    }
}
