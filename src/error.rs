use thiserror::Error;

/// Failures a poller can hit while talking to an external feed. All of them
/// are recoverable: the poll loop logs, backs off and retries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl FeedError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        FeedError::MalformedPayload(msg.into())
    }
}
