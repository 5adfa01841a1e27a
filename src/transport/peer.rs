//! Outbound links to peer brokers
//!
//! Each peer gets one WebSocket connection, opened on the first forward and
//! reopened on the next forward after it dropped. Sends are fire-and-forget:
//! the caller never waits, and the acknowledgements peers send back are
//! only logged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::protocol::{BrokerInfo, Frame, Payload};
use crate::transport::lock;

#[derive(Debug, Clone)]
pub struct PeerLinks {
    own_id: String,
    links: Arc<Mutex<HashMap<String, UnboundedSender<Payload>>>>,
}

impl PeerLinks {
    /// Links whose frames are signed with `own_id`.
    pub fn new(own_id: impl Into<String>) -> Self {
        Self {
            own_id: own_id.into(),
            links: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queues `payload` for `broker`. Must be called within a tokio runtime.
    pub fn forward(&self, broker: &BrokerInfo, payload: Payload) {
        let mut links = lock(&self.links);
        let payload = match links.get(&broker.broker_id) {
            Some(link) => match link.send(payload) {
                Ok(()) => return,
                Err(mpsc::error::SendError(payload)) => {
                    debug!("Link to broker {} is down, reconnecting", broker.broker_id);
                    payload
                }
            },
            None => payload,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(payload).is_err() {
            return;
        }
        links.insert(broker.broker_id.clone(), tx);
        tokio::spawn(run_link(self.own_id.clone(), broker.clone(), rx));
    }

    pub fn len(&self) -> usize {
        lock(&self.links).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.links).is_empty()
    }
}

async fn run_link(own_id: String, broker: BrokerInfo, mut rx: UnboundedReceiver<Payload>) {
    let url = format!("ws://{}", broker.address);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!("Could not reach broker {} at {url}: {e}", broker.broker_id);
            return;
        }
    };
    debug!("Opened link to broker {} at {url}", broker.broker_id);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(payload) = outgoing else { break };
                let text = match Frame::new(own_id.as_str(), payload).encode() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode forward to {}: {e}", broker.broker_id);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    warn!("Failed to forward to broker {}: {e}", broker.broker_id);
                    break;
                }
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => match Frame::decode(text.as_str()) {
                    Ok(frame) => debug!(
                        "Broker {} answered forward with {:?}",
                        frame.sender,
                        frame.payload.reason_code()
                    ),
                    Err(e) => warn!("Invalid frame from broker {}: {e}", broker.broker_id),
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Link to broker {} failed: {e}", broker.broker_id);
                    break;
                }
            }
        }
    }
    debug!("Link to broker {} closed", broker.broker_id);
}
