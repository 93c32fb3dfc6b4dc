use thiserror::Error;

/// Top-level error type for the beacon-net crate.
///
/// Transport and HTTP-status failures never surface here; they resolve inside
/// [`crate::NetworkClient::send`] to a callback invocation or a retry
/// decision. This type covers construction problems only.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http client construction failed: {0}")]
    Client(String),
}
