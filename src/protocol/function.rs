//! Function-call messages carried in `PUBLISH.content`.
//!
//! A caller publishes a `Call` on `functions/{name}/call`; a serving node
//! answers with an `Ack` on `functions/{name}/ack` and later a `Result` on
//! `functions/{name}/result`. A cloud node may answer a call it cannot serve
//! with a `Nack`. All messages of one exchange share a [`RequestId`].

use serde::{Deserialize, Serialize};

use crate::geo::Geofence;
use crate::protocol::payload::Topic;

pub const FUNCTIONS_PREFIX: &str = "functions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionAction {
    Call,
    Ack,
    Nack,
    Result,
}

impl FunctionAction {
    /// Topic level used for this action.
    pub fn topic_level(&self) -> &'static str {
        match self {
            FunctionAction::Call => "call",
            FunctionAction::Ack => "ack",
            FunctionAction::Nack => "nack",
            FunctionAction::Result => "result",
        }
    }
}

/// Whether the acknowledgement is sent on its own or piggybacked on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeCode {
    Normal,
    Piggy,
}

/// Correlation id of one call: sequence number and originating client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId {
    pub seq: u64,
    pub client_id: String,
    /// Free-form label, e.g. the name of the place the call was issued from.
    #[serde(default)]
    pub place: String,
}

impl RequestId {
    pub fn new(seq: u64, client_id: impl Into<String>) -> Self {
        Self {
            seq,
            client_id: client_id.into(),
            place: String::new(),
        }
    }

    pub fn at(mut self, place: impl Into<String>) -> Self {
        self.place = place.into();
        self
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.client_id, self.seq)
    }
}

/// Where the answer to a call should be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTopic {
    pub topic: Topic,
    pub fence: Geofence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMessage {
    pub func_name: String,
    pub action: FunctionAction,
    pub data: String,
    pub type_code: TypeCode,
    pub response_topic: ResponseTopic,
    pub sender_id: String,
    pub receiver_id: String,
    pub req_id: RequestId,
}

impl FunctionMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// `functions/{name}/{action}`
pub fn function_topic(func_name: &str, action: FunctionAction) -> Topic {
    Topic::new(format!(
        "{FUNCTIONS_PREFIX}/{func_name}/{}",
        action.topic_level()
    ))
}
