//! Upload error types.

/// Errors reported by an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Errors produced by an upload session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("device busy")]
    DeviceBusy,

    #[error("no G-code for build plate {0}")]
    NoGcode(usize),

    #[error("server returned {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("network error: {0}")]
    Transport(#[from] TransportError),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` for failures that reached (or tried to reach) the network.
    pub fn is_network(&self) -> bool {
        matches!(self, UploadError::Http { .. } | UploadError::Transport(_))
    }
}
