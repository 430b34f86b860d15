//! Error types for directory queries

/// Result type alias for directory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the upstream client and the query normalizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every configured mirror failed for one logical call
    #[error("All upstream mirrors failed for {path}: {detail}")]
    UpstreamUnavailable { path: String, detail: String },

    /// A lookup returned no result
    #[error("{0} not found")]
    NotFound(String),

    /// A caller-supplied parameter is out of bounds or malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
