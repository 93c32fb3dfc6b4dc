//! Response wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Handle `type` value that carries client-side store payloads.
pub const STORE_HANDLE_TYPE: &str = "state:store";

/// One decoded response envelope: zero or more success handles plus any
/// errors and warnings. All fields are optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub handle: Vec<EventHandle>,
    #[serde(default)]
    pub errors: Vec<EventError>,
    #[serde(default)]
    pub warnings: Vec<EventError>,
}

/// A success record from the server. `event_index` points back into the
/// request's event list and is never re-serialized when the handle is
/// dispatched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandle {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub handle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing)]
    pub event_index: Option<usize>,
}

impl EventHandle {
    pub fn is_store_handle(&self) -> bool {
        self.handle_type
            .as_deref()
            .is_some_and(|handle_type| handle_type.eq_ignore_ascii_case(STORE_HANDLE_TYPE))
    }
}

/// An error or warning record from the server. Warnings share this shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing)]
    pub event_index: Option<usize>,
}
