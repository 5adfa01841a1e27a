//! Broker side of the federation.
//!
//! Public types:
//! - `Broker`: the matching and forwarding engine of one broker.
//! - `BrokerAreaRegistry`: which broker covers which area.
//! - `ForwardingPolicy`: pluggable veto on forwarding publications to peers.
//!
//! The transport layer wires the engine to the network; see
//! `transport::websocket` and `transport::local`.

pub mod area;
pub mod directory;
pub mod engine;
pub mod policy;
pub mod topic;

pub use area::{BrokerArea, BrokerAreaRegistry};
pub use engine::{Broker, Dispatch};
pub use policy::{ForwardAll, ForwardingPolicy, SuffixPolicy};

#[cfg(test)]
mod tests;
