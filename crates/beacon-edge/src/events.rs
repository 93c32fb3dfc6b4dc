use crate::EdgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Key under which the batch request identifier is attached to every
/// dispatched notification.
pub const REQUEST_ID_KEY: &str = "requestId";
/// Key under which the originating event identifier is attached when a
/// response record could be paired back to its event.
pub const REQUEST_EVENT_ID_KEY: &str = "requestEventId";

/// An application-originated record awaiting batched transmission. Owned by
/// the host runtime; this crate only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Opaque caller-assigned identifier, stable for the event's lifetime.
    pub id: String,
    /// Creation timestamp. Expected to also appear inside the payload tree
    /// under conventional keys; this crate does not inject it.
    pub timestamp: String,
    /// Arbitrary structured payload tree.
    pub data: Map<String, Value>,
    /// Optional dataset-override identifier. Blank values are treated as
    /// absent.
    pub dataset_id: Option<String>,
}

impl PendingEvent {
    pub fn new(id: impl Into<String>, timestamp: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            data,
            dataset_id: None,
        }
    }
}

/// Logical channel a notification is dispatched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    /// The serialized outbound request, dispatched once per send.
    RequestContent,
    /// Success handles decoded from the response.
    ResponseContent,
    /// Errors and warnings, server-provided or synthesized.
    ErrorResponseContent,
}

/// One notification dispatched to the host runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub channel: EventChannel,
    /// Channel-refining source, e.g. a success handle's `type`. `None` means
    /// the channel's default source.
    pub source: Option<String>,
    pub data: Map<String, Value>,
}

/// Dispatch boundary to the host runtime's event bus.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: OutboundEvent) -> Result<(), EdgeError>;
}

#[derive(Default)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: OutboundEvent) -> Result<(), EdgeError> {
        Ok(())
    }
}

/// Emitter that records every dispatched event, for tests and diagnostics.
#[derive(Clone, Default)]
pub struct BufferedEventEmitter {
    inner: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl BufferedEventEmitter {
    pub fn snapshot(&self) -> Vec<OutboundEvent> {
        let guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.clone()
    }
}

impl EventEmitter for BufferedEventEmitter {
    fn emit(&self, event: OutboundEvent) -> Result<(), EdgeError> {
        let mut guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.push(event);
        Ok(())
    }
}
