use thiserror::Error;

/// Broad classification of a [`ConvertError`], independent of where in a run
/// the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Format,
    Io,
    NotFound,
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid key prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("key was empty")]
    EmptyKey,

    #[error("value was empty")]
    EmptyValue,

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Decompression error: {0}")]
    DecompressionError(String),

    #[error("No value at {0}")]
    NotFound(String),

    #[error("entry {ordinal}: {source}")]
    Entry {
        ordinal: u64,
        #[source]
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Wrap an error with the 1-based ordinal of the record being processed.
    pub fn at_entry(ordinal: u64, source: ConvertError) -> Self {
        ConvertError::Entry {
            ordinal,
            source: Box::new(source),
        }
    }

    /// Ordinal of the failing record, if the error was raised mid-run.
    pub fn ordinal(&self) -> Option<u64> {
        match self {
            ConvertError::Entry { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Io(_) => ErrorKind::Io,
            ConvertError::Walk(e) => {
                if e.io_error().is_some() {
                    ErrorKind::Io
                } else {
                    // symlink loops and similar traversal faults
                    ErrorKind::Format
                }
            }
            ConvertError::Json(e) if e.is_io() => ErrorKind::Io,
            ConvertError::Json(_)
            | ConvertError::Base64(_)
            | ConvertError::InvalidFormat(_)
            | ConvertError::InvalidKey(_)
            | ConvertError::EmptyKey
            | ConvertError::EmptyValue
            | ConvertError::CompressionError(_)
            | ConvertError::DecompressionError(_) => ErrorKind::Format,
            ConvertError::InvalidPrefix(_) | ConvertError::InvalidConfig(_) => ErrorKind::Config,
            ConvertError::NotFound(_) => ErrorKind::NotFound,
            ConvertError::Entry { source, .. } => source.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
