//! The `client` module implements the client side of the protocol.
//!
//! [`GeoClient`] speaks to one broker at a time through a [`Channel`] opened
//! by a [`Connector`]. It correlates replies with pending requests, keeps
//! out-of-order replies in an [`Inbox`], and follows the federation's
//! redirects when the client's location belongs to another broker.

pub mod channel;
pub mod engine;
pub mod inbox;

pub use channel::{Channel, Connector};
pub use engine::{
    AckOutcome, CallRequest, ClientOptions, GeoClient, LocationStatus, SubscribeStatus,
    UnsubscribeStatus,
};
pub use inbox::Inbox;
