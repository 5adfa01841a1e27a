//! Error types shared across the crate.

use thiserror::Error;

use crate::protocol::{BrokerInfo, ReasonCode};

/// Failures surfaced by the client protocol engine and its channels.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("channel to broker closed")]
    ChannelClosed,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("broker answered with {0}")]
    Rejected(ReasonCode),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("no broker is responsible for the current location")]
    NoResponsibleBroker,

    #[error("handoff to {} at {} failed: {reason}", .target.broker_id, .target.address)]
    HandoffFailed { target: BrokerInfo, reason: String },

    #[error("gave up after {0} broker redirects")]
    TooManyRedirects(usize),
}

/// Failures loading the broker area registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read broker area file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse broker areas: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("broker {0} has no area in the registry")]
    UnknownBroker(String),

    #[error("more than one root broker configured")]
    MultipleRoots,
}
