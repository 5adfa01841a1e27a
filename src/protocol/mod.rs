//! Wire vocabulary shared by clients and brokers.
//!
//! Every payload travels inside a [`Frame`] that names its sender. Frames are
//! JSON encoded, one per transport message. The application-level function
//! call format carried inside `PUBLISH.content` lives in [`function`].

pub mod function;
pub mod payload;
pub mod reason;

pub use payload::{BrokerInfo, Frame, Payload, PayloadKind, PublishPayload, Topic};
pub use reason::ReasonCode;

#[cfg(test)]
mod tests;
