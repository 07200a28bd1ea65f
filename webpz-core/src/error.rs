use thiserror::Error;

/// Per-item failure. Recovered by the batch coordinator, never batch-wide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    /// Rejected at the input boundary; the transcoder never saw it.
    #[error("{0}: not an accepted image type")]
    UnacceptedInputType(String),

    #[error("{0}: unsupported or corrupt image data")]
    UnsupportedFormat(String),

    #[error("encode failed: {0}")]
    EncodeFailure(String),

    /// The batch was abandoned before this item started.
    #[error("{0}: cancelled before conversion started")]
    Cancelled(String),
}

#[derive(Error, Debug)]
pub enum WebpzError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Archive build failed: {0}")]
    ArchiveBuild(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, WebpzError>;
