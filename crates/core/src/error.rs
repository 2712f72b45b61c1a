//! Error taxonomy shared by every provider adapter.

/// Result alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by provider adapters.
///
/// Transport, status and decode failures are kept distinct so the caller
/// can render them differently. None of them are retried by the adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced an HTTP response (refused, timed out, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for display.
        body: String,
    },

    /// A response body or event could not be decoded.
    #[error("failed to decode {context}: {source}")]
    Decode {
        /// What was being decoded (e.g. "claude response").
        context: String,
        /// The underlying parse error, naming the offending field.
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered with a success status but reported an error in
    /// the body.
    #[error("backend reported an error: {0}")]
    Backend(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid provider or request configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A streaming task panicked.
    #[error("stream task panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Build a decode error for the given context.
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Whether this error came from a cancelled request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
