use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage and persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object store rejected an upload
    #[error("upload rejected ({status}): {message}")]
    Upload { status: u16, message: String },

    /// Object store could not be reached
    #[error("storage connection error: {0}")]
    Connection(String),

    /// Invalid storage configuration
    #[error("storage configuration error: {0}")]
    Config(String),

    /// Log file I/O failed
    #[error("generation log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Log entry could not be encoded or decoded
    #[error("generation log encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
