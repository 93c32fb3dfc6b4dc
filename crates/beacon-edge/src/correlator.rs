//! Correlates decoded response records back to the events that produced them
//! and dispatches them to the host runtime.

use crate::events::{
    EventChannel, EventEmitter, OutboundEvent, REQUEST_EVENT_ID_KEY, REQUEST_ID_KEY,
};
use crate::response::{EdgeResponse, EventError, EventHandle};
use beacon_net::ResponseCallback;
use beacon_store::{StoreManager, StorePayload};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, trace, warn};

/// Maintains the mapping from outstanding request identifier to the ordered
/// list of event identifiers batched into that request, and turns each
/// decoded record into one outbound notification.
///
/// Registrations never auto-expire; [`ResponseCorrelator::resolve`] removes
/// them, and resolving an unknown identifier is a safe no-op, which is what
/// makes ignoring a late callback equivalent to cancellation.
pub struct ResponseCorrelator {
    // order matters: response records address events by index
    waiting: Mutex<HashMap<String, Vec<String>>>,
    emitter: Arc<dyn EventEmitter>,
    store: Arc<StoreManager>,
}

impl ResponseCorrelator {
    pub fn new(emitter: Arc<dyn EventEmitter>, store: Arc<StoreManager>) -> Self {
        Self {
            waiting: Mutex::new(HashMap::new()),
            emitter,
            store,
        }
    }

    /// Registers the ordered event-id list batched into `request_id`. A
    /// no-op when either argument is empty; a second registration under the
    /// same id replaces the first.
    pub fn register_batch(&self, request_id: &str, event_ids: Vec<String>) {
        if request_id.is_empty() || event_ids.is_empty() {
            return;
        }

        let mut waiting = self.waiting.lock().expect("correlator mutex poisoned");
        if waiting.insert(request_id.to_string(), event_ids).is_some() {
            warn!(%request_id, "name collision for request id, events list is overwritten");
        }
    }

    /// Removes and returns the registration for `request_id`, or `None` when
    /// unknown.
    pub fn resolve(&self, request_id: &str) -> Option<Vec<String>> {
        if request_id.is_empty() {
            return None;
        }
        let mut waiting = self.waiting.lock().expect("correlator mutex poisoned");
        waiting.remove(request_id)
    }

    /// Returns the registered event-id list without removing it.
    pub fn waiting_events(&self, request_id: &str) -> Option<Vec<String>> {
        if request_id.is_empty() {
            return None;
        }
        let waiting = self.waiting.lock().expect("correlator mutex poisoned");
        waiting.get(request_id).cloned()
    }

    /// Processes one decoded success record: dispatches each handle on the
    /// response-content channel, forwards state-store handles to the store
    /// manager, and dispatches errors/warnings on the error channel.
    pub fn process_success_response(&self, request_id: &str, record: &Value) {
        let response = match serde_json::from_value::<EdgeResponse>(record.clone()) {
            Ok(response) => response,
            Err(err) => {
                warn!(%request_id, %err, "server response record failed to decode");
                return;
            }
        };

        trace!(
            %request_id,
            handles = response.handle.len(),
            errors = response.errors.len(),
            warnings = response.warnings.len(),
            "processing server response record"
        );

        for handle in &response.handle {
            self.process_event_handle(request_id, handle);
        }
        self.dispatch_event_errors(request_id, &response.errors, true);
        self.dispatch_event_errors(request_id, &response.warnings, false);
    }

    /// Processes one terminal error object: a full response envelope has its
    /// `errors` array dispatched with index pairing, anything else is
    /// dispatched as a single generic error.
    pub fn process_error_response(&self, request_id: &str, error: &Value) {
        if let Ok(response) = serde_json::from_value::<EdgeResponse>(error.clone())
            && !response.errors.is_empty()
        {
            self.dispatch_event_errors(request_id, &response.errors, true);
            return;
        }

        match serde_json::from_value::<EventError>(error.clone()) {
            Ok(single) => self.dispatch_event_errors(request_id, &[single], true),
            Err(err) => {
                warn!(%request_id, %err, "server error response failed to decode");
            }
        }
    }

    fn process_event_handle(&self, request_id: &str, handle: &EventHandle) {
        if handle.is_store_handle() {
            self.save_store_payloads(handle);
        }

        let request_event_id = self.request_event_id(request_id, handle.event_index);
        let Ok(Value::Object(data)) = serde_json::to_value(handle) else {
            return;
        };
        if data.is_empty() {
            return;
        }

        self.dispatch(OutboundEvent {
            channel: EventChannel::ResponseContent,
            source: handle
                .handle_type
                .clone()
                .filter(|handle_type| !handle_type.is_empty()),
            data: with_correlation_ids(data, request_id, request_event_id),
        });
    }

    fn dispatch_event_errors(&self, request_id: &str, records: &[EventError], is_error: bool) {
        for record in records {
            if is_error {
                error!(%request_id, ?record, "received event error for request");
            } else {
                warn!(%request_id, ?record, "received event warning for request");
            }

            let request_event_id = self.request_event_id(request_id, record.event_index);
            let Ok(Value::Object(data)) = serde_json::to_value(record) else {
                continue;
            };
            if data.is_empty() {
                continue;
            }

            self.dispatch(OutboundEvent {
                channel: EventChannel::ErrorResponseContent,
                source: None,
                data: with_correlation_ids(data, request_id, request_event_id),
            });
        }
    }

    /// Pairs a record's event index back to the originating event id. An
    /// absent or out-of-range index degrades to `None`; never an error.
    fn request_event_id(&self, request_id: &str, event_index: Option<usize>) -> Option<String> {
        let waiting = self.waiting_events(request_id)?;
        let index = event_index?;
        waiting.get(index).cloned()
    }

    fn save_store_payloads(&self, handle: &EventHandle) {
        let payloads: Vec<StorePayload> = handle
            .payload
            .iter()
            .filter_map(|entry| {
                serde_json::from_value::<StorePayload>(Value::Object(entry.clone())).ok()
            })
            .collect();
        if payloads.is_empty() {
            return;
        }

        match self.store.save(&payloads) {
            Ok(()) => debug!(count = payloads.len(), "processed store response payload(s)"),
            Err(err) => warn!(%err, "failed to persist store response payloads"),
        }
    }

    fn dispatch(&self, event: OutboundEvent) {
        if let Err(err) = self.emitter.emit(event) {
            warn!(%err, "failed to dispatch outbound event");
        }
    }
}

fn with_correlation_ids(
    mut data: Map<String, Value>,
    request_id: &str,
    request_event_id: Option<String>,
) -> Map<String, Value> {
    data.insert(REQUEST_ID_KEY.to_string(), Value::String(request_id.to_string()));
    if let Some(request_event_id) = request_event_id {
        data.insert(
            REQUEST_EVENT_ID_KEY.to_string(),
            Value::String(request_event_id),
        );
    }
    data
}

/// Bridges the network client's callbacks to a [`ResponseCorrelator`] for
/// one batch request.
pub struct CorrelatorCallback {
    request_id: String,
    correlator: Arc<ResponseCorrelator>,
}

impl CorrelatorCallback {
    pub fn new(request_id: impl Into<String>, correlator: Arc<ResponseCorrelator>) -> Self {
        Self {
            request_id: request_id.into(),
            correlator,
        }
    }
}

impl ResponseCallback for CorrelatorCallback {
    fn on_response(&self, record: Value) {
        self.correlator
            .process_success_response(&self.request_id, &record);
    }

    fn on_error(&self, error: Value) {
        self.correlator
            .process_error_response(&self.request_id, &error);
    }

    fn on_complete(&self) {
        if let Some(removed) = self.correlator.resolve(&self.request_id) {
            trace!(
                request_id = %self.request_id,
                count = removed.len(),
                "request complete, registration removed"
            );
        }
    }
}
