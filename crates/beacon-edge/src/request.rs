//! Outbound request wire format.

use beacon_store::StorePayload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Response-streaming configuration echoed to the server so it frames its
/// response body accordingly. `enabled` is derived: true only when both
/// separator characters are supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streaming {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_feed: Option<String>,
}

impl Streaming {
    pub fn new(record_separator: Option<String>, line_feed: Option<String>) -> Self {
        let enabled = record_separator.is_some() && line_feed.is_some();
        Self {
            enabled,
            record_separator,
            line_feed,
        }
    }
}

/// Configuration block addressed to the edge gateway itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KonductorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<Streaming>,
}

/// Active client-side store entries echoed back to the server.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateMetadata {
    pub entries: Vec<StorePayload>,
}

/// Optional top-level `meta` block of the request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub konductor_config: Option<KonductorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateMetadata>,
}

/// One resolved identity within a namespace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

impl IdentityItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authentication_state: None,
            primary: None,
        }
    }
}

/// Already-resolved identities keyed by namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap(pub BTreeMap<String, Vec<IdentityItem>>);

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, namespace: impl Into<String>, item: IdentityItem) {
        self.0.entry(namespace.into()).or_default().push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Optional top-level `xdm` context block of the request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_map: Option<IdentityMap>,
}

/// The outbound request payload: optional metadata, optional context, and
/// the ordered list of serialized events.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xdm: Option<RequestContext>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Map<String, Value>>,
}
