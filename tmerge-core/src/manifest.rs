//! Typed view over a decoded metainfo (`.torrent`) document.

use crate::bencode::{self, Value};
use crate::error::{Error, Result};
use crate::pieces::{Digest, PieceTable};
use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Path components joined with `/`; the bare name for single-file layouts.
    pub rel_path: String,
    pub size: u64,
}

/// Immutable after [`Manifest::load`].
#[derive(Clone, Debug)]
pub struct Manifest {
    name: String,
    announce: Option<String>,
    total_size: u64,
    piece_length: u64,
    files: Vec<FileEntry>,
    single_file: bool,
    pieces: PieceTable,
    info: Value,
}

impl Manifest {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Self::load(&raw)
    }

    pub fn load(raw: &[u8]) -> Result<Self> {
        let root = bencode::decode(raw)?;
        let announce = match root.get("announce")? {
            Some(v) => Some(v.as_str()?.to_string()),
            None => None,
        };
        let info = root.require("info")?.clone();

        let name = info.require("name")?.as_str()?.to_string();
        let piece_length = non_negative(info.require("piece length")?, "piece length")?;
        if piece_length == 0 {
            return Err(Error::decode("piece length must be positive"));
        }
        let pieces = PieceTable::from_bytes(info.require("pieces")?.as_bytes()?.to_vec())?;

        let (files, single_file) = match (info.get("length")?, info.get("files")?) {
            (Some(len), _) => {
                let size = non_negative(len, "length")?;
                (vec![FileEntry { rel_path: name.clone(), size }], true)
            }
            (None, Some(list)) => (parse_files(list)?, false),
            (None, None) => return Err(Error::decode("info has neither \"length\" nor \"files\"")),
        };
        let total_size = files
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(f.size))
            .ok_or_else(|| Error::decode("file sizes overflow a 64-bit total"))?;

        let expected = total_size.div_ceil(piece_length);
        if pieces.len() as u64 != expected {
            return Err(Error::decode(format!(
                "{} piece digests for {} bytes at piece length {} (expected {})",
                pieces.len(),
                total_size,
                piece_length,
                expected
            )));
        }

        Ok(Self { name, announce, total_size, piece_length, files, single_file, pieces, info })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn announce(&self) -> Option<&str> {
        self.announce.as_deref()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn is_single_file(&self) -> bool {
        self.single_file
    }

    pub fn pieces(&self) -> &PieceTable {
        &self.pieces
    }

    pub fn info(&self) -> &Value {
        &self.info
    }

    /// Expected byte length of piece `index`; only the last piece may be short.
    pub fn piece_len(&self, index: usize) -> Result<u64> {
        let len = self.pieces.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let start = index as u64 * self.piece_length;
        Ok((self.total_size - start).min(self.piece_length))
    }

    /// SHA-1 over the re-encoded `info` dictionary.
    pub fn info_hash(&self) -> Digest {
        Sha1::digest(bencode::encode(&self.info)).into()
    }
}

fn non_negative(v: &Value, key: &str) -> Result<u64> {
    let n = v.as_int()?;
    u64::try_from(n).map_err(|_| Error::decode(format!("{key:?} is negative: {n}")))
}

fn parse_files(list: &Value) -> Result<Vec<FileEntry>> {
    let mut out = Vec::new();
    for f in list.as_list()? {
        let size = non_negative(f.require("length")?, "length")?;
        let parts = f
            .require("path")?
            .as_list()?
            .iter()
            .map(|p| p.as_str())
            .collect::<Result<Vec<_>>>()?;
        if parts.is_empty() {
            return Err(Error::decode("file entry with empty path"));
        }
        out.push(FileEntry { rel_path: parts.join("/"), size });
    }
    if out.is_empty() {
        return Err(Error::decode("\"files\" list is empty"));
    }
    Ok(out)
}
