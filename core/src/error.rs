//! Error types for the transaction-generation engine

/// Common error type for the engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O errors (socket, file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex encoding/decoding errors
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// secp256k1 signing/keygen errors
    #[error("secp256k1 error: {0}")]
    Secp(#[from] bitcoin::secp256k1::Error),

    /// Bitcoin address parsing errors
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed or unrecognized configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// An invariant the driver assumes holds was violated; the caller
    /// should log this and abort the process rather than unwind.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Custom error message
    #[error("{0}")]
    Custom(String),
}

/// Type alias for `Result<T, Error>`
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

impl From<bitcoin::address::ParseError> for Error {
    fn from(e: bitcoin::address::ParseError) -> Self {
        Error::InvalidAddress(e.to_string())
    }
}
