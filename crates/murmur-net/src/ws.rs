use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use murmur_shared::error::ProtocolError;
use murmur_shared::protocol::ServerEvent;
use murmur_shared::types::UserId;

use crate::error::RealtimeError;
use crate::realtime::{RealtimeCommand, RealtimeConnector, RealtimeLink, RealtimeNotification};

/// WebSocket implementation of [`RealtimeConnector`].
///
/// Reconnection is left to the caller: when the socket drops, the task emits
/// [`RealtimeNotification::Disconnected`] and exits.
#[derive(Debug, Clone)]
pub struct WsConnector {
    socket_url: Url,
    buffer: usize,
}

impl WsConnector {
    pub fn new(socket_url: &str, buffer: usize) -> Result<Self, RealtimeError> {
        Ok(Self {
            socket_url: Url::parse(socket_url)?,
            buffer: buffer.max(1),
        })
    }

    /// Connection URL carrying the identity as the `userId` query parameter.
    pub fn url_for(&self, user_id: &UserId) -> Url {
        let mut url = self.socket_url.clone();
        url.query_pairs_mut().append_pair("userId", user_id.as_str());
        url
    }
}

#[async_trait]
impl RealtimeConnector for WsConnector {
    async fn connect(&self, user_id: &UserId) -> Result<RealtimeLink, RealtimeError> {
        let url = self.url_for(user_id);
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::Handshake(e.to_string()))?;

        info!(user = %user_id, url = %self.socket_url, "Realtime socket connected");

        let (cmd_tx, mut cmd_rx) = mpsc::channel::<RealtimeCommand>(self.buffer);
        let (notif_tx, notif_rx) = mpsc::channel::<RealtimeNotification>(self.buffer);
        let (mut write, mut read) = ws_stream.split();

        tokio::spawn(async move {
            let reason = loop {
                tokio::select! {
                    // --- Outbound commands ---
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(RealtimeCommand::Emit(event)) => {
                                let text = match event.to_json() {
                                    Ok(t) => t,
                                    Err(e) => {
                                        warn!(event = event.name(), error = %e, "Failed to encode signal");
                                        continue;
                                    }
                                };
                                debug!(event = event.name(), "Emitting signal");
                                if let Err(e) = write.send(WsMessage::Text(text)).await {
                                    break format!("send failed: {e}");
                                }
                            }
                            Some(RealtimeCommand::Shutdown) => {
                                let _ = write.close().await;
                                break "shutdown requested".to_string();
                            }
                            None => {
                                // All senders dropped
                                let _ = write.close().await;
                                break "command channel closed".to_string();
                            }
                        }
                    }

                    // --- Inbound frames ---
                    frame = read.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => match ServerEvent::from_json(&text) {
                                Ok(event) => {
                                    debug!(event = event.name(), "Realtime event received");
                                    if notif_tx.send(RealtimeNotification::Event(event)).await.is_err() {
                                        let _ = write.close().await;
                                        break "listener dropped".to_string();
                                    }
                                }
                                Err(ProtocolError::UnknownEvent(name)) => {
                                    debug!(event = %name, "Ignoring unknown realtime event");
                                }
                                Err(e) => {
                                    warn!(error = %e, "Malformed realtime frame");
                                }
                            },
                            Some(Ok(WsMessage::Ping(payload))) => {
                                let _ = write.send(WsMessage::Pong(payload)).await;
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                break frame
                                    .map(|f| format!("closed by server: {}", f.reason))
                                    .unwrap_or_else(|| "closed by server".to_string());
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break format!("socket error: {e}"),
                            None => break "stream ended".to_string(),
                        }
                    }
                }
            };

            info!(reason = %reason, "Realtime socket loop terminated");
            let _ = notif_tx
                .send(RealtimeNotification::Disconnected { reason })
                .await;
        });

        Ok(RealtimeLink {
            commands: cmd_tx,
            notifications: notif_rx,
        })
    }
}
