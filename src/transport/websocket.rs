//! WebSocket broker server
//!
//! Accepts connections from clients and from peer brokers alike. Every text
//! message carries one JSON [`Frame`]; the first frame's sender names the
//! connection. Responsibilities:
//! - Register each connection under its sender id so replies and deliveries
//!   can be routed to it
//! - Run every payload through the engine while holding the broker lock
//! - Send the resulting [`Dispatch`] after the lock is released: frames to
//!   local connections, forwards through [`PeerLinks`]
//! - Evict a client whose connection closes, unless the id was taken over by
//!   a newer connection meanwhile

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, trace, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Broker, Dispatch};
use crate::protocol::{Frame, Payload, ReasonCode};
use crate::transport::lock;
use crate::transport::peer::PeerLinks;

type Connections = Arc<Mutex<HashMap<String, UnboundedSender<WsMessage>>>>;

/// Shared state of one running server.
#[derive(Clone)]
struct Server {
    broker_id: String,
    broker: Arc<Mutex<Broker>>,
    connections: Connections,
    peers: PeerLinks,
}

/// Binds `addr` and serves until the listener fails.
pub async fn start_broker_server(addr: &str, broker: Broker) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Broker {} listening on ws://{}",
        broker.broker_id(),
        listener.local_addr()?
    );
    serve(listener, Arc::new(Mutex::new(broker))).await;
    Ok(())
}

/// Accepts connections on an already bound listener.
pub async fn serve(listener: TcpListener, broker: Arc<Mutex<Broker>>) {
    let broker_id = lock(&broker).broker_id().to_string();
    let server = Server {
        peers: PeerLinks::new(broker_id.as_str()),
        broker_id,
        broker,
        connections: Arc::new(Mutex::new(HashMap::new())),
    };

    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                trace!("Accepted TCP connection from {remote}");
                spawn(server.clone().handle_connection(stream));
            }
            Err(e) => {
                error!("Failed to accept connection: {e}");
                break;
            }
        }
    }
}

impl Server {
    async fn handle_connection(self, stream: TcpStream) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake error: {e}");
                return;
            }
        };
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Failed to send message: {e}");
                    break;
                }
            }
        });

        let mut peer_id: Option<String> = None;
        while let Some(msg) = ws_receiver.next().await {
            let text = match msg {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Connection of {peer_id:?} failed: {e}");
                    break;
                }
            };
            let frame = match Frame::decode(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(
                        "Invalid frame from {peer_id:?}: {e} | {}",
                        text.chars().take(100).collect::<String>()
                    );
                    continue;
                }
            };

            if peer_id.as_deref() != Some(frame.sender.as_str()) {
                // a connection answers to one id at a time
                if let Some(previous) = peer_id.take() {
                    debug!("Connection of {previous} now speaks for {}", frame.sender);
                    self.connection_closed(&previous, &tx);
                }
                debug!("Registering connection of {}", frame.sender);
                lock(&self.connections).insert(frame.sender.clone(), tx.clone());
                peer_id = Some(frame.sender.clone());
            }

            let dispatch = lock(&self.broker).handle(&frame.sender, frame.payload);
            self.deliver(dispatch);
        }

        if let Some(id) = peer_id {
            self.connection_closed(&id, &tx);
        }
    }

    fn connection_closed(&self, id: &str, tx: &UnboundedSender<WsMessage>) {
        {
            let mut connections = lock(&self.connections);
            match connections.get(id) {
                Some(current) if current.same_channel(tx) => {
                    connections.remove(id);
                }
                _ => {
                    trace!("Connection of {id} was replaced, keeping its session");
                    return;
                }
            }
        }
        info!("{id} disconnected");
        let dispatch = lock(&self.broker).handle(
            id,
            Payload::Disconnect {
                reason_code: ReasonCode::NormalDisconnection,
                broker_info: None,
            },
        );
        self.deliver(dispatch);
    }

    fn deliver(&self, dispatch: Dispatch) {
        {
            let connections = lock(&self.connections);
            for (to, payload) in dispatch.outgoing {
                let Some(connection) = connections.get(&to) else {
                    warn!("No connection for {to}, dropping {:?}", payload.kind());
                    continue;
                };
                match Frame::new(self.broker_id.as_str(), payload).encode() {
                    Ok(text) => {
                        if connection.send(WsMessage::text(text)).is_err() {
                            debug!("Connection of {to} is gone");
                        }
                    }
                    Err(e) => error!("Failed to encode frame for {to}: {e}"),
                }
            }
        }
        for (broker, payload) in dispatch.forwards {
            self.peers.forward(&broker, payload);
        }
    }
}
