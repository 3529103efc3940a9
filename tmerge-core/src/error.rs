//! Error type shared by every stage of a merge run.

/// Fatal errors. An incomplete merge is not an error; it is reported through
/// [`crate::merge::MergeReport::unmatched_indices`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest is not well-formed bencode, or a required key is missing
    /// or has the wrong type.
    #[error("decode error: {0}")]
    Decode(String),

    /// A digest table was indexed past its end.
    #[error("piece index {index} out of range (table has {len} pieces)")]
    IndexOutOfRange {
        /// Requested piece index.
        index: usize,
        /// Number of pieces in the table.
        len: usize,
    },

    /// Piece size of zero handed to the scanner or executor.
    #[error("piece size must be positive")]
    InvalidPieceSize,

    /// Open, seek, read or write failure on any file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
