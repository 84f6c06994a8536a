//! Error types for the content API boundary.

/// Error from content source operations.
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// JSON deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a fixture.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The configured endpoint is not a usable URL.
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    /// The repository did not advertise a master ref.
    #[error("repository has no master ref")]
    NoMasterRef,

    /// A pagination cursor that does not belong to this source.
    #[error("invalid pagination cursor: {0}")]
    InvalidCursor(String),
}
