//! Error types for rsacs4.

use thiserror::Error;

/// Main error type for rsacs4 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller input was rejected before anything was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The server reply could not be parsed as an XML document.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// Parser diagnostic.
        reason: String,
        /// Raw response body as received.
        raw: Vec<u8>,
    },

    /// The server answered with an error document.
    #[error("Server error: {0}")]
    Server(String),

    /// Network-level failure from the HTTP client.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Caller-supplied markup could not be parsed or lacks the expected element.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rsacs4 operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Raw response bytes, if this error carries them.
    #[must_use]
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
