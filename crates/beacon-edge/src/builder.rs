use crate::events::PendingEvent;
use crate::request::{
    EdgeRequest, IdentityMap, KonductorConfig, RequestContext, RequestMetadata, StateMetadata,
    Streaming,
};
use beacon_store::StoreManager;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::warn;

const DATASET_ID_KEY: &str = "datasetId";
const META_KEY: &str = "meta";
const COLLECT_KEY: &str = "collect";

/// Assembles an outbound request payload from a batch of pending events, the
/// current identity map and the active client-side store entries.
///
/// Deterministic and side-effect-free apart from reading the store manager.
pub struct RequestBuilder {
    store: Arc<StoreManager>,
    record_separator: Option<String>,
    line_feed: Option<String>,
}

impl RequestBuilder {
    pub fn new(store: Arc<StoreManager>) -> Self {
        Self {
            store,
            record_separator: None,
            line_feed: None,
        }
    }

    /// Enables streaming of the server response. Streaming is only derived
    /// as enabled once both separator characters are set.
    pub fn enable_response_streaming(
        &mut self,
        record_separator: impl Into<String>,
        line_feed: impl Into<String>,
    ) {
        self.record_separator = Some(record_separator.into());
        self.line_feed = Some(line_feed.into());
    }

    /// Builds the request payload, or `None` when the batch is empty.
    pub fn build(&self, events: &[PendingEvent], identity_map: &IdentityMap) -> Option<EdgeRequest> {
        if events.is_empty() {
            return None;
        }

        let streaming = match (&self.record_separator, &self.line_feed) {
            (None, None) => None,
            (record_separator, line_feed) => Some(Streaming::new(
                record_separator.clone(),
                line_feed.clone(),
            )),
        };
        let konductor_config = streaming.map(|streaming| KonductorConfig {
            streaming: Some(streaming),
        });

        let entries = match self.store.active_payloads() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "failed to read active store entries, omitting state block");
                Vec::new()
            }
        };
        let state = if entries.is_empty() {
            None
        } else {
            Some(StateMetadata { entries })
        };

        let meta = if konductor_config.is_none() && state.is_none() {
            None
        } else {
            Some(RequestMetadata {
                konductor_config,
                state,
            })
        };

        let xdm = if identity_map.is_empty() {
            None
        } else {
            Some(RequestContext {
                identity_map: Some(identity_map.clone()),
            })
        };

        Some(EdgeRequest {
            meta,
            xdm,
            events: events.iter().map(serialize_event).collect(),
        })
    }
}

/// Serializes one pending event. A non-blank dataset override becomes a
/// `meta.collect.datasetId` annotation next to the payload; any literal
/// `datasetId` key in the raw payload is never propagated.
fn serialize_event(event: &PendingEvent) -> Map<String, Value> {
    let mut data = event.data.clone();
    data.remove(DATASET_ID_KEY);

    let dataset_id = event
        .dataset_id
        .as_deref()
        .map(str::trim)
        .filter(|dataset_id| !dataset_id.is_empty());
    if let Some(dataset_id) = dataset_id {
        data.insert(
            META_KEY.to_string(),
            json!({COLLECT_KEY: {DATASET_ID_KEY: dataset_id}}),
        );
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IdentityItem;
    use beacon_store::{MemoryKeyValueStore, StorePayload};

    fn builder() -> RequestBuilder {
        RequestBuilder::new(Arc::new(StoreManager::new(Arc::new(
            MemoryKeyValueStore::new(),
        ))))
    }

    fn event_with_payload(id: &str, payload: Value) -> PendingEvent {
        let Value::Object(data) = payload else {
            panic!("test payload must be an object");
        };
        PendingEvent::new(id, "2026-08-23T10:00:00Z", data)
    }

    #[test]
    fn empty_batch_expected_no_request() {
        let builder = builder();
        assert!(builder.build(&[], &IdentityMap::new()).is_none());
    }

    #[test]
    fn full_request_expected_exact_wire_shape() {
        let mut builder = builder();
        builder.enable_response_streaming("\u{0}", "\n");
        let mut identity_map = IdentityMap::new();
        identity_map.add_item("ECID", IdentityItem::new("abc"));

        let request = builder
            .build(
                &[event_with_payload("e1", json!({"xdm": {"test": "value"}}))],
                &identity_map,
            )
            .expect("request should build");

        let encoded = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            encoded,
            json!({
                "xdm": {"identityMap": {"ECID": [{"id": "abc"}]}},
                "meta": {"konductorConfig": {"streaming": {
                    "enabled": true,
                    "recordSeparator": "\u{0}",
                    "lineFeed": "\n",
                }}},
                "events": [{"xdm": {"test": "value"}}],
            })
        );
    }

    #[test]
    fn empty_identity_map_expected_no_xdm_block() {
        let builder = builder();
        let request = builder
            .build(
                &[event_with_payload("e1", json!({"xdm": {}}))],
                &IdentityMap::new(),
            )
            .expect("request should build");
        assert!(request.xdm.is_none());
        assert!(request.meta.is_none());
    }

    #[test]
    fn active_store_entries_expected_in_state_block() {
        let store = Arc::new(StoreManager::new(Arc::new(MemoryKeyValueStore::new())));
        store
            .save(&[StorePayload {
                key: "k".to_string(),
                value: "v".to_string(),
                max_age: 100.0,
            }])
            .expect("save should succeed");
        let builder = RequestBuilder::new(store);

        let request = builder
            .build(
                &[event_with_payload("e1", json!({"xdm": {}}))],
                &IdentityMap::new(),
            )
            .expect("request should build");

        let meta = request.meta.expect("meta should be present");
        let state = meta.state.expect("state should be present");
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.entries[0].key, "k");
        // streaming was never enabled
        assert!(meta.konductor_config.is_none());
    }

    #[test]
    fn dataset_override_expected_collect_meta_and_literal_key_stripped() {
        let builder = builder();
        let mut event = event_with_payload(
            "e1",
            json!({"xdm": {"test": "value"}, "datasetId": "raw-leftover"}),
        );
        event.dataset_id = Some("  ds-123  ".to_string());

        let request = builder
            .build(&[event], &IdentityMap::new())
            .expect("request should build");

        let serialized = &request.events[0];
        assert!(!serialized.contains_key("datasetId"));
        assert_eq!(
            serialized["meta"],
            json!({"collect": {"datasetId": "ds-123"}})
        );
    }

    #[test]
    fn blank_dataset_override_expected_no_meta_block() {
        let builder = builder();
        let mut event = event_with_payload("e1", json!({"xdm": {"test": "value"}}));
        event.dataset_id = Some("   ".to_string());

        let request = builder
            .build(&[event], &IdentityMap::new())
            .expect("request should build");

        assert!(!request.events[0].contains_key("meta"));
    }

    #[test]
    fn events_expected_in_input_order() {
        let builder = builder();
        let request = builder
            .build(
                &[
                    event_with_payload("e1", json!({"xdm": {"n": 1}})),
                    event_with_payload("e2", json!({"xdm": {"n": 2}})),
                ],
                &IdentityMap::new(),
            )
            .expect("request should build");

        assert_eq!(request.events[0]["xdm"], json!({"n": 1}));
        assert_eq!(request.events[1]["xdm"], json!({"n": 2}));
    }
}
