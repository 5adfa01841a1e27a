//! Client channels over WebSockets.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use tungstenite::protocol::Message as WsMessage;

use crate::client::{Channel, Connector};
use crate::protocol::{Frame, Payload};
use crate::utils::ClientError;

/// Opens `ws://{address}` (or the address itself if it already is a URL).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Channel = WsChannel;

    async fn connect(&self, address: &str, client_id: &str) -> Result<WsChannel, ClientError> {
        let url = if address.starts_with("ws://") || address.starts_with("wss://") {
            address.to_string()
        } else {
            format!("ws://{address}")
        };
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        debug!("Client {client_id} opened {url}");
        Ok(WsChannel {
            client_id: client_id.to_string(),
            stream,
        })
    }
}

pub struct WsChannel {
    client_id: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Channel for WsChannel {
    async fn send(&mut self, payload: Payload) -> Result<(), ClientError> {
        let text = Frame::new(self.client_id.as_str(), payload).encode()?;
        self.stream
            .send(WsMessage::text(text))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn recv(&mut self, budget: Duration) -> Result<Option<Payload>, ClientError> {
        let deadline = Instant::now() + budget;
        loop {
            let next = match timeout_at(deadline, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };
            match next {
                Some(Ok(WsMessage::Text(text))) => {
                    let frame = Frame::decode(text.as_str())?;
                    trace!("Client {} received {:?} from {}", self.client_id, frame.payload.kind(), frame.sender);
                    return Ok(Some(frame.payload));
                }
                Some(Ok(WsMessage::Close(_))) | None => return Err(ClientError::ChannelClosed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!("Closing channel of {} failed: {e}", self.client_id);
        }
    }
}
