use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Server-issued state payload as it appears on the wire, both in a
/// `state:store` response handle and in the `meta.state.entries` request
/// block echoed back on subsequent requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorePayload {
    pub key: String,
    pub value: String,
    /// Max age in seconds this payload should be kept. Values <= 0 mean the
    /// entry must be deleted on the client.
    pub max_age: f64,
}

/// A persisted store payload together with the absolute expiry timestamp
/// derived from its max age at save time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub payload: StorePayload,
    /// Unix epoch milliseconds after which the entry no longer qualifies as
    /// active.
    pub expires_at_ms: i64,
}

impl StoreEntry {
    pub fn new(payload: StorePayload) -> Self {
        let expires_at_ms = now_ms() + (payload.max_age * 1000.0) as i64;
        Self {
            payload,
            expires_at_ms,
        }
    }

    pub fn is_expired(&self) -> bool {
        now_ms() >= self.expires_at_ms
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
