use crate::builder::RequestBuilder;
use crate::correlator::{CorrelatorCallback, ResponseCorrelator};
use crate::errors::EdgeError;
use crate::events::{EventChannel, EventEmitter, OutboundEvent, PendingEvent, REQUEST_ID_KEY};
use crate::request::IdentityMap;
use beacon_net::{Framing, NetworkClient, RetryDecision};
use beacon_store::{KeyValueStore, StoreManager};
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};
use uuid::Uuid;

/// Configuration for an [`EdgeClient`].
#[derive(Clone, Debug)]
pub struct EdgeClientConfig {
    /// Ingestion endpoint base URL, e.g. `https://edge.example.com/ee/v1/interact`.
    pub endpoint: String,
    /// Configuration identifier appended to every request URL.
    pub config_id: String,
    pub record_separator: Option<String>,
    pub line_feed: Option<String>,
}

impl EdgeClientConfig {
    pub fn new(endpoint: impl Into<String>, config_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config_id: config_id.into(),
            record_separator: None,
            line_feed: None,
        }
    }

    /// Requests a streamed response framed by the given separator characters.
    pub fn with_streaming(
        mut self,
        record_separator: impl Into<String>,
        line_feed: impl Into<String>,
    ) -> Self {
        self.record_separator = Some(record_separator.into());
        self.line_feed = Some(line_feed.into());
        self
    }
}

/// Ships batches of pending events to the ingestion endpoint and reconciles
/// the response back to the events that produced it.
///
/// Owns and injects the store manager, request builder, network client and
/// response correlator; nothing here is process-wide, so multiple clients
/// can coexist and tests get full isolation.
pub struct EdgeClient {
    config: EdgeClientConfig,
    net: NetworkClient,
    builder: RequestBuilder,
    store: Arc<StoreManager>,
    correlator: Arc<ResponseCorrelator>,
    emitter: Arc<dyn EventEmitter>,
}

impl EdgeClient {
    pub fn new(
        config: EdgeClientConfig,
        backing_store: Arc<dyn KeyValueStore>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self, EdgeError> {
        if config.endpoint.is_empty() {
            return Err(EdgeError::InvalidConfiguration(
                "endpoint must not be empty".to_string(),
            ));
        }

        let store = Arc::new(StoreManager::new(backing_store));
        let mut builder = RequestBuilder::new(store.clone());
        if let (Some(record_separator), Some(line_feed)) =
            (&config.record_separator, &config.line_feed)
        {
            builder.enable_response_streaming(record_separator.clone(), line_feed.clone());
        }
        let correlator = Arc::new(ResponseCorrelator::new(emitter.clone(), store.clone()));

        Ok(Self {
            config,
            net: NetworkClient::new()?,
            builder,
            store,
            correlator,
            emitter,
        })
    }

    /// The TTL store manager holding server-issued state entries.
    pub fn store(&self) -> &Arc<StoreManager> {
        &self.store
    }

    /// The request/response correlation registry.
    pub fn correlator(&self) -> &Arc<ResponseCorrelator> {
        &self.correlator
    }

    /// Builds, registers and sends one batch of pending events.
    ///
    /// Returns the network client's retry decision so the caller can
    /// re-enqueue the batch with backoff. An empty batch is a no-op.
    pub async fn send_events(
        &self,
        events: &[PendingEvent],
        identity_map: &IdentityMap,
        retries_remaining: u32,
    ) -> Result<RetryDecision, EdgeError> {
        let Some(request) = self.builder.build(events, identity_map) else {
            trace!("empty batch, nothing to send");
            return Ok(RetryDecision::NoRetry);
        };

        let request_id = Uuid::new_v4().to_string();
        self.correlator.register_batch(
            &request_id,
            events.iter().map(|event| event.id.clone()).collect(),
        );

        let body = serde_json::to_value(&request)
            .map_err(|err| EdgeError::Serialization(err.to_string()))?;
        self.dispatch_request_content(&request_id, &body);

        let url = self
            .net
            .build_url(&self.config.endpoint, &self.config.config_id, &request_id)?;
        let framing = match (&self.config.record_separator, &self.config.line_feed) {
            (Some(record_separator), Some(line_feed)) => Some(Framing {
                record_separator: record_separator.clone(),
                line_feed: line_feed.clone(),
            }),
            _ => None,
        };
        let callback = CorrelatorCallback::new(request_id.clone(), self.correlator.clone());

        let decision = self
            .net
            .send(
                url,
                &body.to_string(),
                None,
                framing.as_ref(),
                &callback,
                retries_remaining,
            )
            .await;

        // On success the callback already resolved the registration; after a
        // terminal error no completion fires, and a retried batch gets a
        // fresh request id, so the stale registration is dropped here.
        if self.correlator.resolve(&request_id).is_some() {
            trace!(%request_id, "dropped registration for finished request");
        }

        Ok(decision)
    }

    /// Dispatches the serialized request once per send, for observability.
    fn dispatch_request_content(&self, request_id: &str, body: &Value) {
        let Some(request_data) = body.as_object() else {
            return;
        };
        let mut data = request_data.clone();
        data.insert(
            REQUEST_ID_KEY.to_string(),
            Value::String(request_id.to_string()),
        );
        if let Err(err) = self.emitter.emit(OutboundEvent {
            channel: EventChannel::RequestContent,
            source: None,
            data,
        }) {
            warn!(%err, "failed to dispatch request content event");
        }
    }
}
