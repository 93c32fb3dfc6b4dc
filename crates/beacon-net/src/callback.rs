use serde_json::Value;
use std::time::Duration;

/// Callbacks invoked by [`crate::NetworkClient::send`] while a server
/// response is consumed.
///
/// Production and test implementations alike implement this one narrow
/// interface; there is no base-service subclassing.
pub trait ResponseCallback: Send + Sync {
    /// Called once per decoded success record. May fire multiple times for a
    /// single request when the response body is streamed.
    fn on_response(&self, record: Value);

    /// Called exactly once when the request failed terminally, with either
    /// the server-provided error object or a synthesized generic one.
    fn on_error(&self, error: Value);

    /// Called when the connection is done and no more records are pending.
    /// Not called on terminal errors or recoverable failures.
    fn on_complete(&self);
}

/// Outcome of a send, telling the caller whether to re-enqueue the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Recoverable failure; retry the whole request after the given interval.
    Retry { after: Duration },
    /// Terminal outcome, successful or not. Do not retry.
    NoRetry,
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }
}
