//! Websocket client for the push transport.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect)
//! - Topic join/leave with the viewer's participant identity
//! - Decoded push events surfaced through an `mpsc` channel
//!
//! The runtime owns routing: it drains [`PushEvent`]s and feeds them to
//! whichever session controller is currently mounted. The core never
//! holds a reference to the transport.
//!
//! Writes go through one ordered channel to a single writer task, so a
//! `leave` issued while the matching `join` is still in flight is
//! always delivered after it. Teardown therefore cannot leak a joined
//! topic.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use futures_util::{SinkExt, StreamExt};

use crate::events::InboundEvent;
use crate::presence::Participant;
use crate::protocol::{ChannelMessage, MessageKind, ProtocolError};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Decoded frames surfaced to the runtime.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// Connection established.
    Connected,
    /// Connection lost.
    Disconnected,
    /// An entity event fanned out by the gateway.
    Event(InboundEvent),
    /// Full-state presence snapshot for a topic.
    Presence {
        topic: String,
        participants: Vec<Participant>,
    },
}

/// The push client.
pub struct PushClient {
    /// The viewer's identity, attached to every join.
    identity: Participant,

    /// Connection state.
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to the websocket writer task.
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Event receiver for the runtime.
    event_rx: Option<mpsc::Receiver<PushEvent>>,

    /// Event sender (held by the reader task).
    event_tx: mpsc::Sender<PushEvent>,

    /// Gateway URL.
    server_url: String,
}

impl PushClient {
    pub fn new(identity: Participant, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            identity,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be taken once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<PushEvent>> {
        self.event_rx.take()
    }

    /// Connect to the gateway and spawn the reader/writer tasks.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;
        let ws_stream = match ws_result {
            Ok((stream, _)) => stream,
            Err(e) => {
                log::warn!("connect to {} failed: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward the ordered outgoing channel to the socket.
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if ws_writer
                    .send(tokio_tungstenite::tungstenite::Message::Binary(data.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            // Channel closed: the client was dropped. Close the socket
            // so the gateway deregisters presence promptly.
            let _ = ws_writer
                .send(tokio_tungstenite::tungstenite::Message::Close(None))
                .await;
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(PushEvent::Connected).await;

        // Reader task: decode incoming frames into push events.
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(incoming) = ws_reader.next().await {
                match incoming {
                    Ok(tokio_tungstenite::tungstenite::Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        let msg = match ChannelMessage::decode(&bytes) {
                            Ok(msg) => msg,
                            Err(e) => {
                                log::warn!("undecodable frame from gateway: {e}");
                                continue;
                            }
                        };

                        let event = match msg.kind {
                            MessageKind::Event => match msg.inbound_event() {
                                Ok(event) => Some(PushEvent::Event(event)),
                                Err(e) => {
                                    log::warn!("bad event payload: {e}");
                                    None
                                }
                            },
                            MessageKind::Presence => match msg.roster() {
                                Ok(participants) => Some(PushEvent::Presence {
                                    topic: msg.topic.clone(),
                                    participants,
                                }),
                                Err(e) => {
                                    log::warn!("bad presence payload: {e}");
                                    None
                                }
                            },
                            MessageKind::Pong => None,
                            other => {
                                log::debug!("unexpected {other:?} frame from gateway");
                                None
                            }
                        };

                        if let Some(event) = event {
                            let _ = event_tx.send(event).await;
                        }
                    }

                    Ok(tokio_tungstenite::tungstenite::Message::Close(_)) | Err(_) => {
                        break;
                    }

                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(PushEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Subscribe to a topic under this client's identity.
    pub async fn join(&self, topic: &str) -> Result<(), ProtocolError> {
        let msg = ChannelMessage::join(topic, &self.identity);
        self.send(msg).await
    }

    /// Unsubscribe from a topic. Safe to call even when the matching
    /// join has not been acknowledged: the write channel preserves
    /// order, and the gateway ignores a leave for an unjoined topic.
    pub async fn leave(&self, topic: &str) -> Result<(), ProtocolError> {
        let msg = ChannelMessage::leave(topic, self.identity.user_id);
        self.send(msg).await
    }

    /// Send a heartbeat ping.
    pub async fn ping(&self) -> Result<(), ProtocolError> {
        self.send(ChannelMessage::ping(self.identity.user_id)).await
    }

    async fn send(&self, msg: ChannelMessage) -> Result<(), ProtocolError> {
        let encoded = msg.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn identity(&self) -> &Participant {
        &self.identity
    }
}

// ===================================================================
// Tests
// ===================================================================
