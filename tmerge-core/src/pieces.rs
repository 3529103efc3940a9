use crate::error::{Error, Result};

/// Size of one piece digest (SHA-1).
pub const DIGEST_LEN: usize = 20;

pub type Digest = [u8; DIGEST_LEN];

/// Ordered table of per-piece SHA-1 digests backed by one flat buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PieceTable {
    buf: Vec<u8>,
}

impl PieceTable {
    /// Wrap a concatenation of 20-byte digests, e.g. the `pieces` blob of a
    /// metainfo file.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        if buf.len() % DIGEST_LEN != 0 {
            return Err(Error::decode(format!(
                "piece digest blob of {} bytes is not a multiple of {}",
                buf.len(),
                DIGEST_LEN
            )));
        }
        Ok(Self { buf })
    }

    pub(crate) fn push(&mut self, d: &Digest) {
        self.buf.extend_from_slice(d);
    }

    pub fn len(&self) -> usize {
        self.buf.len() / DIGEST_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Digest> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let start = index * DIGEST_LEN;
        let rec: &Digest = self.buf[start..start + DIGEST_LEN]
            .try_into()
            .map_err(|_| Error::IndexOutOfRange { index, len })?;
        Ok(rec)
    }

    /// True when both tables have a digest at `index` and they are equal.
    pub fn matches_at(&self, other: &PieceTable, index: usize) -> bool {
        match (self.get(index), other.get(index)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Element-wise comparison, padded to the longer table with `false`.
    pub fn compare_with(&self, other: &PieceTable) -> Vec<bool> {
        let n = self.len().max(other.len());
        (0..n).map(|i| self.matches_at(other, i)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Digest> + '_ {
        self.buf.chunks_exact(DIGEST_LEN).filter_map(|c| <&Digest>::try_from(c).ok())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Lowercase hex of a digest, for logs and reports.
pub fn to_hex(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(LUT[(b >> 4) as usize] as char);
        s.push(LUT[(b & 0xF) as usize] as char);
    }
    s
}
