use serde::{Deserialize, Serialize};

/// Reason code carried on every acknowledgement and disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    Success,
    NormalDisconnection,
    GrantedQoS0,
    LocationUpdated,
    NotConnectedOrNoLocation,
    NoMatchingSubscribers,
    NoMatchingSubscribersButForwarded,
    NoSubscriptionExisted,
    ProtocolError,
    WrongBroker,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
