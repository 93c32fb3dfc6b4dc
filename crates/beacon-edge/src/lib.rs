//! Client-side library that batches experience events, ships them to an edge
//! ingestion endpoint over HTTP, and reconciles the streamed response back to
//! the individual events that produced it.

pub mod builder;
pub mod client;
pub mod correlator;
pub mod errors;
pub mod events;
pub mod request;
pub mod response;

pub use builder::RequestBuilder;
pub use client::{EdgeClient, EdgeClientConfig};
pub use correlator::{CorrelatorCallback, ResponseCorrelator};
pub use errors::EdgeError;
pub use events::{
    BufferedEventEmitter, EventChannel, EventEmitter, NoopEventEmitter, OutboundEvent,
    PendingEvent,
};
pub use request::{
    EdgeRequest, IdentityItem, IdentityMap, KonductorConfig, RequestContext, RequestMetadata,
    StateMetadata, Streaming,
};
pub use response::{EdgeResponse, EventError, EventHandle, STORE_HANDLE_TYPE};
