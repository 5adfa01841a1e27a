//! The `transport` module carries frames between clients and brokers.
//!
//! - [`websocket`]: the broker's WebSocket server, one connection per client
//!   or peer broker, with the engine behind a shared lock
//! - [`peer`]: outbound links used to forward publications to other brokers
//! - [`client`]: the client engine's [`Connector`](crate::client::Connector)
//!   over WebSockets
//! - [`local`]: a whole federation in one process, wired with channels

pub mod client;
pub mod local;
pub mod peer;
pub mod websocket;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A panic while holding a lock leaves the guarded maps usable, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
