use neuroscout_interchange::InterchangeError;

/// All errors that can be returned by a Neuroscout API client or store.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status code.
    #[error("{url} returned HTTP {code}")]
    Status { code: u16, url: String },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The response body was not JSON.
    #[error("failed to parse response from {url} as JSON: {message}")]
    Decode { url: String, message: String },

    /// The response was JSON but not the document we expected.
    #[error(transparent)]
    Interchange(#[from] InterchangeError),

    /// The key/value store could not be read or written.
    #[error("store error: {0}")]
    Store(String),

    /// A blocking request task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(String),
}

impl ClientError {
    /// Whether the server rejected the request as unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Status { code: 401 | 403, .. })
    }
}
