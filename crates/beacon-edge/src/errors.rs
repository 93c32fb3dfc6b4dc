use thiserror::Error;

/// Top-level error type for the beacon-edge crate.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("event dispatch failed: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Network(#[from] beacon_net::NetworkError),

    #[error(transparent)]
    Store(#[from] beacon_store::StoreError),
}
