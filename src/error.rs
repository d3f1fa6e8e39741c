//! Error types for the export engine

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the export engine
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Video codec failed to initialize or encode
    #[error("codec error: {0}")]
    Codec(String),

    /// Interleave or container rule violated
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A fixed-size buffer cannot hold the requested data
    #[error("buffer too small: need {need}, have {have}")]
    BufferOverflow { need: usize, have: usize },

    /// The recording reached the RIFF size ceiling; not a failure, but the
    /// file must be closed now
    #[error("recording size limit reached")]
    SizeLimit,

    /// Invalid CLI or configuration value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
