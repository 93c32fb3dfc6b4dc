pub mod callback;
pub mod client;
pub mod demux;
pub mod errors;

pub use callback::{ResponseCallback, RetryDecision};
pub use client::NetworkClient;
pub use demux::{Framing, split_records};
pub use errors::NetworkError;
