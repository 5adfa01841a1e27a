//! In-process federation
//!
//! Runs several brokers in one process and connects clients to them through
//! in-memory channels. Routing mirrors the WebSocket server: replies go to
//! the connection registered under the addressee, forwards are handed to the
//! target broker directly, and closing a channel evicts its client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use crate::broker::{Broker, BrokerArea, BrokerAreaRegistry, Dispatch};
use crate::client::{Channel, Connector};
use crate::protocol::{Payload, ReasonCode};
use crate::transport::lock;
use crate::utils::{ClientError, RegistryError};

struct LocalBroker {
    broker: Mutex<Broker>,
    connections: Mutex<HashMap<String, UnboundedSender<Payload>>>,
}

/// Brokers addressed by their configured address.
#[derive(Clone, Default)]
pub struct LocalFederation {
    brokers: Arc<Mutex<HashMap<String, Arc<LocalBroker>>>>,
}

impl LocalFederation {
    pub fn new() -> Self {
        Self::default()
    }

    /// One broker per area, all sharing the same registry.
    pub fn from_areas(areas: Vec<BrokerArea>) -> Result<Self, RegistryError> {
        let federation = Self::new();
        for area in &areas {
            let registry = BrokerAreaRegistry::new(&area.broker.broker_id, areas.clone())?;
            federation.add_broker(Broker::new(registry));
        }
        Ok(federation)
    }

    /// Adds a broker, reachable at the address of its own area entry.
    pub fn add_broker(&self, broker: Broker) {
        let address = broker.areas().own_info().address.clone();
        let node = LocalBroker {
            broker: Mutex::new(broker),
            connections: Mutex::new(HashMap::new()),
        };
        lock(&self.brokers).insert(address, Arc::new(node));
    }

    /// Connector for clients of this federation.
    pub fn connector(&self) -> LocalConnector {
        LocalConnector {
            federation: self.clone(),
        }
    }

    /// Runs `f` against the broker at `address`.
    pub fn inspect<R>(&self, address: &str, f: impl FnOnce(&Broker) -> R) -> Option<R> {
        let node = self.node(address)?;
        let broker = lock(&node.broker);
        Some(f(&broker))
    }

    fn node(&self, address: &str) -> Option<Arc<LocalBroker>> {
        lock(&self.brokers).get(address).cloned()
    }

    fn node_by_id(&self, broker_id: &str) -> Option<Arc<LocalBroker>> {
        lock(&self.brokers)
            .values()
            .find(|node| lock(&node.broker).broker_id() == broker_id)
            .cloned()
    }

    fn deliver(&self, node: &LocalBroker, sender: &str, payload: Payload) {
        let dispatch = lock(&node.broker).handle(sender, payload);
        self.route(node, dispatch);
    }

    fn route(&self, node: &LocalBroker, dispatch: Dispatch) {
        let own_id = lock(&node.broker).broker_id().to_string();
        {
            let connections = lock(&node.connections);
            for (to, payload) in dispatch.outgoing {
                match connections.get(&to) {
                    Some(connection) => {
                        if connection.send(payload).is_err() {
                            debug!("Connection of {to} is gone");
                        }
                    }
                    None => trace!("Broker {own_id} has no connection for {to}, dropping {:?}", payload.kind()),
                }
            }
        }
        for (target, payload) in dispatch.forwards {
            match self.node_by_id(&target.broker_id) {
                Some(peer) => self.deliver(&peer, &own_id, payload),
                None => warn!("Broker {} is not part of this federation", target.broker_id),
            }
        }
    }
}

#[derive(Clone)]
pub struct LocalConnector {
    federation: LocalFederation,
}

impl Connector for LocalConnector {
    type Channel = LocalChannel;

    async fn connect(&self, address: &str, client_id: &str) -> Result<LocalChannel, ClientError> {
        let node = self
            .federation
            .node(address)
            .ok_or_else(|| ClientError::Transport(format!("no broker at {address}")))?;
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&node.connections).insert(client_id.to_string(), tx.clone());
        Ok(LocalChannel {
            federation: self.federation.clone(),
            node,
            client_id: client_id.to_string(),
            tx,
            rx,
        })
    }
}

pub struct LocalChannel {
    federation: LocalFederation,
    node: Arc<LocalBroker>,
    client_id: String,
    tx: UnboundedSender<Payload>,
    rx: UnboundedReceiver<Payload>,
}

impl Channel for LocalChannel {
    async fn send(&mut self, payload: Payload) -> Result<(), ClientError> {
        self.federation.deliver(&self.node, &self.client_id, payload);
        Ok(())
    }

    async fn recv(&mut self, budget: Duration) -> Result<Option<Payload>, ClientError> {
        match tokio::time::timeout(budget, self.rx.recv()).await {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => Err(ClientError::ChannelClosed),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) {
        {
            let mut connections = lock(&self.node.connections);
            match connections.get(&self.client_id) {
                Some(current) if current.same_channel(&self.tx) => {
                    connections.remove(&self.client_id);
                }
                _ => return,
            }
        }
        self.federation.deliver(
            &self.node,
            &self.client_id,
            Payload::Disconnect {
                reason_code: ReasonCode::NormalDisconnection,
                broker_info: None,
            },
        );
    }
}
