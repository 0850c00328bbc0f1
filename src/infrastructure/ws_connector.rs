// WebSocket transport for the client connection manager
use crate::client::connection::{Connector, TransportError, TransportLink};
use crate::domain::events::{ClientCommand, ServerEvent};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::connect_async;

const OUTBOUND_BUFFER: usize = 32;
const INBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        let (stream, _) = connect_async(self.url.as_str()).await.map_err(|e| match e {
            WsError::Http(response) => TransportError::Handshake {
                url: self.url.clone(),
                status: response.status().as_u16(),
            },
            other => TransportError::Connect {
                url: self.url.clone(),
                reason: other.to_string(),
            },
        })?;
        tracing::debug!("WebSocket connected to {}", self.url);

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientCommand>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerEvent>(INBOUND_BUFFER);

        // Reader: ends on close, error, or when the manager drops the receiver.
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = inbound_tx.closed() => break,
                    msg = source.next() => msg,
                };
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if inbound_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring unreadable frame: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read failed: {}", e);
                        break;
                    }
                }
            }
        });

        // Writer: closes the socket once every command sender is gone.
        tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode command: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
