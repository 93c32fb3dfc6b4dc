//! HTTP client for the edge ingestion endpoint.

use crate::callback::{ResponseCallback, RetryDecision};
use crate::demux::{Framing, split_records};
use crate::errors::NetworkError;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

const GENERIC_ERROR_NAMESPACE: &str = "global";
const GENERIC_ERROR_MESSAGE: &str = "generic request failure";

/// Status codes classified as recoverable; the request should be retried.
const RECOVERABLE_STATUS_CODES: [u16; 5] = [408, 429, 502, 503, 504];

const QUERY_PARAM_CONFIG_ID: &str = "configId";
const QUERY_PARAM_REQUEST_ID: &str = "requestId";

/// Performs POST requests to the edge ingestion endpoint, classifies the
/// response by status code and hands decoded records to a
/// [`ResponseCallback`].
#[derive(Clone, Debug)]
pub struct NetworkClient {
    http: reqwest::Client,
}

impl NetworkClient {
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Client with explicit connect and total-request timeouts.
    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(read)
            .build()
            .map_err(|err| NetworkError::Client(err.to_string()))?;
        Ok(Self { http })
    }

    /// Builds the request URL from the endpoint base, appending the
    /// configuration and batch request identifiers as query parameters.
    pub fn build_url(
        &self,
        endpoint: &str,
        config_id: &str,
        request_id: &str,
    ) -> Result<Url, NetworkError> {
        Url::parse_with_params(
            endpoint,
            &[
                (QUERY_PARAM_CONFIG_ID, config_id),
                (QUERY_PARAM_REQUEST_ID, request_id),
            ],
        )
        .map_err(|err| NetworkError::InvalidUrl(err.to_string()))
    }

    /// Sends `body` to `url` and drives `callback` with the outcome.
    ///
    /// Default `accept`/`content-type` headers apply only when `headers` is
    /// `None`; caller-supplied headers are used verbatim. `framing` controls
    /// how a 200 body is demultiplexed into records. `retries_remaining` is
    /// the caller's retry budget, carried here for diagnostics only; the
    /// returned [`RetryDecision`] tells the caller whether spending one is
    /// warranted.
    pub async fn send(
        &self,
        url: Url,
        body: &str,
        headers: Option<HashMap<String, String>>,
        framing: Option<&Framing>,
        callback: &dyn ResponseCallback,
        retries_remaining: u32,
    ) -> RetryDecision {
        if body.trim().is_empty() {
            warn!(%url, "request body is empty, dropping this request");
            callback.on_complete();
            return RetryDecision::NoRetry;
        }

        let mut request = self.http.post(url.clone()).body(body.to_string());
        match headers {
            Some(custom) => {
                for (name, value) in custom {
                    request = request.header(name, value);
                }
            }
            None => {
                request = request
                    .header(ACCEPT, "application/json")
                    .header(CONTENT_TYPE, "application/json");
            }
        }

        trace!(%url, retries_remaining, "sending request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() || err.is_connect() => {
                debug!(%url, %err, "recoverable transport failure");
                return RetryDecision::Retry {
                    after: DEFAULT_RETRY_INTERVAL,
                };
            }
            Err(err) => {
                warn!(%url, %err, "unrecoverable transport failure");
                callback.on_error(compose_generic_error(None, Some(&err.to_string())));
                return RetryDecision::NoRetry;
            }
        };

        self.handle_response(response, framing, callback).await
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
        framing: Option<&Framing>,
        callback: &dyn ResponseCallback,
    ) -> RetryDecision {
        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => {
                debug!(status = status.as_u16(), "request was successful");
                // The request timeout still applies while the body is read;
                // a stalled stream here must classify like a recoverable
                // status, not like an empty success.
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(err) if err.is_timeout() => {
                        debug!(%err, "recoverable transport failure while reading body");
                        return RetryDecision::Retry {
                            after: DEFAULT_RETRY_INTERVAL,
                        };
                    }
                    Err(err) => {
                        warn!(%err, "unrecoverable transport failure while reading body");
                        callback.on_error(compose_generic_error(None, Some(&err.to_string())));
                        return RetryDecision::NoRetry;
                    }
                };
                if body.is_empty() {
                    trace!("no content to handle");
                } else {
                    for record in split_records(&body, framing) {
                        callback.on_response(record);
                    }
                }
                callback.on_complete();
                RetryDecision::NoRetry
            }
            StatusCode::NO_CONTENT => {
                debug!("request was successful, no content returned");
                callback.on_complete();
                RetryDecision::NoRetry
            }
            status if RECOVERABLE_STATUS_CODES.contains(&status.as_u16()) => {
                debug!(
                    status = status.as_u16(),
                    "recoverable error code, request should be retried"
                );
                let after = retry_after_interval(&response).unwrap_or(DEFAULT_RETRY_INTERVAL);
                RetryDecision::Retry { after }
            }
            status => {
                warn!(status = status.as_u16(), "unrecoverable error code");
                let body = response.text().await.ok();
                callback.on_error(compose_generic_error(body.as_deref(), None));
                RetryDecision::NoRetry
            }
        }
    }
}

/// Reads the `Retry-After` response header as integer seconds. HTTP-date
/// values are not supported; the server only sends integers.
fn retry_after_interval(response: &reqwest::Response) -> Option<Duration> {
    let seconds = response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(seconds))
}

/// Composes the error object handed to [`ResponseCallback::on_error`].
///
/// A body that parses as a JSON object is a server-provided error and is
/// forwarded unchanged. Otherwise a generic error is synthesized from the
/// transport error description when one exists, falling back to a fixed
/// message.
fn compose_generic_error(body: Option<&str>, transport_error: Option<&str>) -> Value {
    if let Some(body) = body
        && let Ok(parsed) = serde_json::from_str::<Value>(body)
        && parsed.is_object()
    {
        return parsed;
    }

    let message = transport_error
        .map(|description| description.trim())
        .filter(|description| !description.is_empty())
        .unwrap_or(GENERIC_ERROR_MESSAGE);

    json!({
        "namespace": GENERIC_ERROR_NAMESPACE,
        "message": message,
    })
}
