//! Error handling for AY conversion components.

use thiserror::Error;

/// Convenient result alias for AY parsing and conversion.
pub type Result<T> = std::result::Result<T, AyError>;

/// Errors that may occur while parsing AY files or rendering songs.
///
/// Only the header-level variants abort a whole run. Everything that can go
/// wrong inside a single song is reported per song by the converter.
#[derive(Debug, Error)]
pub enum AyError {
    /// File does not start with the expected `ZXAY` marker.
    #[error("AY file must start with ZXAY header")]
    InvalidFileId,
    /// Unsupported AY container type (only `EMUL` is recognized).
    #[error("unsupported AY type '{typ}'")]
    UnsupportedType {
        /// Type identifier encountered inside the header.
        typ: String,
    },
    /// Buffer too small to contain the fixed header.
    #[error("unexpected end of file (need {needed} bytes, got {len})")]
    UnexpectedEof {
        /// Minimum number of bytes required.
        needed: usize,
        /// Actual buffer length.
        len: usize,
    },
    /// Song structure table is missing or does not fit inside the file.
    #[error("song structure table at offset {offset:?} does not fit inside AY file")]
    SongTableOutOfRange {
        /// Resolved table offset, if the pointer itself was valid.
        offset: Option<usize>,
    },
    /// The frame buffer could not grow.
    #[error("failed to allocate frame buffer after {frames} frames")]
    Allocation {
        /// Number of frames captured before the failure.
        frames: usize,
    },
    /// Output artifact could not be written or removed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Generic validation error.
    #[error("{msg}")]
    InvalidData {
        /// Human-readable explanation of the validation failure.
        msg: String,
    },
}

impl AyError {
    /// Whether this error invalidates the container as a whole.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            AyError::InvalidFileId
                | AyError::UnsupportedType { .. }
                | AyError::UnexpectedEof { .. }
                | AyError::SongTableOutOfRange { .. }
        )
    }
}

impl From<String> for AyError {
    fn from(s: String) -> Self {
        AyError::InvalidData { msg: s }
    }
}

impl From<&str> for AyError {
    fn from(s: &str) -> Self {
        AyError::InvalidData { msg: s.to_string() }
    }
}
