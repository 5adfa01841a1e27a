//! # geobroker
//!
//! `geobroker` is a geo-distributed publish/subscribe broker. Clients and
//! publications carry locations and geofences; a federation of brokers, each
//! responsible for one geographic area, routes publications to subscribers
//! whose geofences and locations match.
//!
//! ## Core Modules
//!
//! - `geo`: locations, geofences and their containment/intersection tests.
//! - `protocol`: payloads, reason codes, frames and the function-call format.
//! - `broker`: the matching and forwarding engine of one broker.
//! - `client`: the client protocol engine with reply demultiplexing and handoff.
//! - `config`: layered configuration from files and environment variables.
//! - `transport`: WebSocket server, peer links, client channels and an
//!   in-process federation.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod geo;
pub mod protocol;
pub mod transport;
pub mod utils;
