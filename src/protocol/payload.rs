use serde::{Deserialize, Serialize};

use crate::geo::{Geofence, Location};
use crate::protocol::reason::ReasonCode;

/// Slash-delimited topic name, matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the last topic level equals `suffix`.
    pub fn ends_with_level(&self, suffix: &str) -> bool {
        self.0.rsplit('/').next() == Some(suffix)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identity and network address of a broker (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub broker_id: String,
    pub address: String,
}

impl BrokerInfo {
    pub fn new(broker_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            broker_id: broker_id.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub topic: Topic,
    pub geofence: Geofence,
    pub content: String,
}

/// Every message exchanged between clients and brokers, and between brokers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    #[serde(rename = "connect")]
    Connect { location: Option<Location> },
    #[serde(rename = "connack")]
    ConnAck { reason_code: ReasonCode },
    #[serde(rename = "disconnect")]
    Disconnect {
        reason_code: ReasonCode,
        broker_info: Option<BrokerInfo>,
    },
    #[serde(rename = "pingreq")]
    PingReq { location: Option<Location> },
    #[serde(rename = "pingresp")]
    PingResp { reason_code: ReasonCode },
    #[serde(rename = "subscribe")]
    Subscribe { topic: Topic, geofence: Geofence },
    #[serde(rename = "suback")]
    SubAck { reason_code: ReasonCode },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: Topic },
    #[serde(rename = "unsuback")]
    UnsubAck { reason_code: ReasonCode },
    #[serde(rename = "publish")]
    Publish(PublishPayload),
    #[serde(rename = "puback")]
    PubAck { reason_code: ReasonCode },
    #[serde(rename = "broker_forward_publish")]
    BrokerForwardPublish {
        publish: PublishPayload,
        publisher_location: Option<Location>,
    },
    #[serde(rename = "broker_forward_subscribe")]
    BrokerForwardSubscribe {
        client_id: String,
        topic: Topic,
        geofence: Geofence,
    },
    #[serde(rename = "broker_forward_unsubscribe")]
    BrokerForwardUnsubscribe { client_id: String, topic: Topic },
    #[serde(rename = "broker_forward_disconnect")]
    BrokerForwardDisconnect {
        client_id: String,
        reason_code: ReasonCode,
    },
    #[serde(rename = "broker_forward_pingreq")]
    BrokerForwardPingreq {
        client_id: String,
        location: Option<Location>,
    },
}

/// Discriminant of [`Payload`], used by waiters to say what they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Connect,
    ConnAck,
    Disconnect,
    PingReq,
    PingResp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    Publish,
    PubAck,
    BrokerForwardPublish,
    BrokerForwardSubscribe,
    BrokerForwardUnsubscribe,
    BrokerForwardDisconnect,
    BrokerForwardPingreq,
}

impl Payload {
    /// The payload's variant without its fields.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Connect { .. } => PayloadKind::Connect,
            Payload::ConnAck { .. } => PayloadKind::ConnAck,
            Payload::Disconnect { .. } => PayloadKind::Disconnect,
            Payload::PingReq { .. } => PayloadKind::PingReq,
            Payload::PingResp { .. } => PayloadKind::PingResp,
            Payload::Subscribe { .. } => PayloadKind::Subscribe,
            Payload::SubAck { .. } => PayloadKind::SubAck,
            Payload::Unsubscribe { .. } => PayloadKind::Unsubscribe,
            Payload::UnsubAck { .. } => PayloadKind::UnsubAck,
            Payload::Publish(_) => PayloadKind::Publish,
            Payload::PubAck { .. } => PayloadKind::PubAck,
            Payload::BrokerForwardPublish { .. } => PayloadKind::BrokerForwardPublish,
            Payload::BrokerForwardSubscribe { .. } => PayloadKind::BrokerForwardSubscribe,
            Payload::BrokerForwardUnsubscribe { .. } => PayloadKind::BrokerForwardUnsubscribe,
            Payload::BrokerForwardDisconnect { .. } => PayloadKind::BrokerForwardDisconnect,
            Payload::BrokerForwardPingreq { .. } => PayloadKind::BrokerForwardPingreq,
        }
    }

    /// Reason code of acknowledgement-like payloads.
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Payload::ConnAck { reason_code }
            | Payload::Disconnect { reason_code, .. }
            | Payload::PingResp { reason_code }
            | Payload::SubAck { reason_code }
            | Payload::UnsubAck { reason_code }
            | Payload::PubAck { reason_code } => Some(*reason_code),
            _ => None,
        }
    }

    pub fn publish(topic: impl Into<String>, geofence: Geofence, content: impl Into<String>) -> Self {
        Payload::Publish(PublishPayload {
            topic: Topic::new(topic),
            geofence,
            content: content.into(),
        })
    }
}

/// A payload together with the identity of whoever sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub sender: String,
    pub payload: Payload,
}

impl Frame {
    pub fn new(sender: impl Into<String>, payload: Payload) -> Self {
        Self {
            sender: sender.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
