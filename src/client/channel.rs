//! Seams between the client engine and whatever carries its payloads.

use std::time::Duration;

use crate::protocol::Payload;
use crate::utils::ClientError;

/// One open connection to one broker.
#[allow(async_fn_in_trait)]
pub trait Channel {
    async fn send(&mut self, payload: Payload) -> Result<(), ClientError>;

    /// Waits at most `budget` for the next payload. `Ok(None)` means the
    /// budget ran out, an error means the connection is unusable.
    async fn recv(&mut self, budget: Duration) -> Result<Option<Payload>, ClientError>;

    async fn close(&mut self);
}

/// Opens channels to brokers by address. `client_id` identifies the
/// client on every frame sent through the channel.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Channel: Channel;

    async fn connect(&self, address: &str, client_id: &str) -> Result<Self::Channel, ClientError>;
}
