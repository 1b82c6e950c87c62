use crate::error::ServerError;
use crate::protocol::{Envelope, ServerMessage};
use crate::service::Command;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

/// WebSocket accept loop. Each connection gets a fresh identity, an
/// unbounded outbound channel, and a read loop that feeds parsed frames into
/// the service queue.
pub struct WsListener {
    address: SocketAddr,
    service_tx: mpsc::UnboundedSender<Command>,
}

impl WsListener {
    pub fn new(address: SocketAddr, service_tx: mpsc::UnboundedSender<Command>) -> Self {
        WsListener {
            address,
            service_tx,
        }
    }

    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.address,
                source,
            })?;

        tracing::info!("listening on ws://{}", self.address);

        while let Ok((stream, peer)) = listener.accept().await {
            let service_tx = self.service_tx.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer, service_tx).await;
            });
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service_tx: mpsc::UnboundedSender<Command>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = Uuid::new_v4();
    tracing::debug!(%peer, conn = %conn_id, "connection opened");

    // Outbound pump: everything the service or this loop wants to send.
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let envelope = match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(conn = %conn_id, error = %e, "unparseable frame");
                        continue;
                    }
                };

                let (reply, response) = oneshot::channel();
                let command = Command::Request {
                    conn: conn_id,
                    sender: tx.clone(),
                    seq: envelope.seq,
                    request: envelope.request,
                    reply,
                };
                if service_tx.send(command).is_err() {
                    break;
                }
                let Ok(ack) = response.await else { break };

                match serde_json::to_string(&ServerMessage::Ack(ack)) {
                    Ok(json) => {
                        if tx.send(Message::Text(json)).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!(conn = %conn_id, error = %e, "ack serialization"),
                }
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn = %conn_id, error = %e, "read error");
                break;
            }
        }
    }

    tracing::debug!(conn = %conn_id, "connection closed");
    let _ = service_tx.send(Command::Disconnected { conn: conn_id });
}
