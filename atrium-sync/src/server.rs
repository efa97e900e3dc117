//! The push gateway: websocket fan-out of events and presence.
//!
//! Architecture:
//! ```text
//! Client A ──┐
//!             ├── TopicHub ("rooms:<id>") ── roster ── snapshots
//! Client B ──┘        ▲
//!                      │ publish(topic, event)
//!                GatewayHandle (backend side)
//! ```
//!
//! Each topic maintains a [`TopicHub`]: one broadcast channel plus the
//! authoritative roster. A `Join` registers the participant and
//! broadcasts a full-state presence snapshot to the whole topic
//! (including the joiner); `Leave` and disconnect deregister and
//! re-broadcast. A `Leave` for a topic the connection never joined is a
//! no-op, which makes client teardown safe to race against an
//! in-flight join. Entity events enter through [`GatewayHandle`] and
//! are fanned out verbatim; the gateway holds no per-entity state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::broadcast::TopicHub;
use crate::events::InboundEvent;
use crate::presence::Participant;
use crate::protocol::{ChannelMessage, MessageKind, ProtocolError};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Broadcast channel capacity per topic.
    pub hub_capacity: usize,
    /// Maximum members per topic.
    pub max_members_per_topic: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4600".to_string(),
            hub_capacity: 256,
            max_members_per_topic: 500,
        }
    }
}

/// Gateway-wide statistics.
#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_frames: u64,
    pub total_bytes: u64,
    pub active_topics: usize,
}

type Hubs = Arc<RwLock<HashMap<String, Arc<TopicHub>>>>;

/// Backend-side handle for publishing events into topics.
#[derive(Clone)]
pub struct GatewayHandle {
    hubs: Hubs,
}

impl GatewayHandle {
    /// Fan an event out to a topic's subscribers. Returns how many
    /// receivers took it; a topic nobody joined yet takes zero.
    pub async fn publish(&self, topic: &str, event: &InboundEvent) -> Result<usize, ProtocolError> {
        let hub = self.hubs.read().await.get(topic).cloned();
        match hub {
            Some(hub) => hub.broadcast(&ChannelMessage::event(topic, event)),
            None => {
                log::trace!("publish to idle topic {topic}");
                Ok(0)
            }
        }
    }

    /// Current roster for a topic, if anyone is there.
    pub async fn roster(&self, topic: &str) -> Option<Vec<Participant>> {
        let hub = self.hubs.read().await.get(topic).cloned();
        match hub {
            Some(hub) => Some(hub.roster().await),
            None => None,
        }
    }

    /// Topics with at least one subscriber.
    pub async fn active_topics(&self) -> Vec<String> {
        self.hubs.read().await.keys().cloned().collect()
    }
}

/// One connection's subscription to a topic.
struct Subscription {
    user_id: Uuid,
    forward: tokio::task::JoinHandle<()>,
}

/// The push gateway server.
pub struct PushGateway {
    config: GatewayConfig,
    hubs: Hubs,
    stats: Arc<RwLock<GatewayStats>>,
}

impl PushGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            hubs: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(GatewayStats::default())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GatewayConfig::default())
    }

    /// Handle for the backend to publish events through.
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            hubs: self.hubs.clone(),
        }
    }

    /// Accept loop. Call from an async runtime; runs until the listener
    /// fails.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("push gateway listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let hubs = self.hubs.clone();
            let stats = self.stats.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, hubs, stats, config).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Drive a single websocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        hubs: Hubs,
        stats: Arc<RwLock<GatewayStats>>,
        config: GatewayConfig,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("websocket connection established from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        // Frames from every subscribed hub funnel into one ordered
        // channel so the writer half stays a single select arm.
        let (out_tx, mut out_rx) = mpsc::channel::<Arc<Vec<u8>>>(256);
        let mut joined: HashMap<String, Subscription> = HashMap::new();

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Binary(data))) => {
                            let bytes: Vec<u8> = data.into();
                            let msg = match ChannelMessage::decode(&bytes) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    log::warn!("failed to decode frame from {addr}: {e}");
                                    continue;
                                }
                            };

                            {
                                let mut s = stats.write().await;
                                s.total_frames += 1;
                                s.total_bytes += bytes.len() as u64;
                            }

                            match msg.kind {
                                MessageKind::Join => {
                                    let participant = msg.participant().unwrap_or_else(|_| {
                                        Participant::new(msg.sender, "Anonymous")
                                    });
                                    Self::handle_join(
                                        &hubs,
                                        &config,
                                        &mut joined,
                                        &out_tx,
                                        &msg.topic,
                                        participant,
                                    )
                                    .await;
                                    let mut s = stats.write().await;
                                    s.active_topics = hubs.read().await.len();
                                }

                                MessageKind::Leave => {
                                    Self::handle_leave(&hubs, &mut joined, &msg.topic).await;
                                    let mut s = stats.write().await;
                                    s.active_topics = hubs.read().await.len();
                                }

                                MessageKind::Event => {
                                    // Relay verbatim to the topic, if live.
                                    let hub = hubs.read().await.get(&msg.topic).cloned();
                                    if let Some(hub) = hub {
                                        hub.broadcast_raw(Arc::new(bytes));
                                    }
                                }

                                MessageKind::Ping => {
                                    let pong = ChannelMessage::pong(msg.sender).encode()?;
                                    ws_sender.send(Message::Binary(pong.into())).await?;
                                }

                                MessageKind::Presence | MessageKind::Pong => {
                                    log::debug!("ignoring client-sent {:?} frame", msg.kind);
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("connection closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }

                        Some(Err(e)) => {
                            log::error!("websocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                outgoing = out_rx.recv() => {
                    match outgoing {
                        Some(frame) => {
                            ws_sender.send(Message::Binary(frame.to_vec().into())).await?;
                        }
                        None => break,
                    }
                }
            }
        }

        // Cleanup: leave every topic this connection joined.
        for (topic, subscription) in joined.drain() {
            subscription.forward.abort();
            Self::deregister(&hubs, &topic, &subscription.user_id).await;
        }

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
            s.active_topics = hubs.read().await.len();
        }

        Ok(())
    }

    /// Subscribe a connection to a topic and snapshot the roster to
    /// everyone there. Idempotent per connection: a repeated join
    /// refreshes the participant metadata and re-snapshots.
    async fn handle_join(
        hubs: &Hubs,
        config: &GatewayConfig,
        joined: &mut HashMap<String, Subscription>,
        out_tx: &mpsc::Sender<Arc<Vec<u8>>>,
        topic: &str,
        participant: Participant,
    ) {
        let hub = {
            let mut hubs_w = hubs.write().await;
            hubs_w
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicHub::new(config.hub_capacity)))
                .clone()
        };

        let already_member = hub.has_member(&participant.user_id).await;
        if !already_member && hub.member_count().await >= config.max_members_per_topic {
            log::warn!("topic {topic} is full, rejecting {}", participant.user_id);
            return;
        }

        let user_id = participant.user_id;
        let name = participant.name.clone();
        let rx = hub.add_member(participant).await;

        if let Some(previous) = joined.remove(topic) {
            previous.forward.abort();
        }

        let forward = Self::spawn_forwarder(rx, out_tx.clone(), topic.to_string());
        joined.insert(topic.to_string(), Subscription { user_id, forward });

        let snapshot = ChannelMessage::presence(topic, &hub.roster().await);
        let _ = hub.broadcast(&snapshot);

        log::info!("{name} ({user_id}) joined {topic}");
    }

    /// Unsubscribe a connection from a topic, if it ever joined it.
    async fn handle_leave(
        hubs: &Hubs,
        joined: &mut HashMap<String, Subscription>,
        topic: &str,
    ) {
        let Some(subscription) = joined.remove(topic) else {
            log::debug!("leave for unjoined topic {topic}, ignoring");
            return;
        };
        subscription.forward.abort();
        Self::deregister(hubs, topic, &subscription.user_id).await;
    }

    /// Remove a member from a hub, snapshot the remaining roster, and
    /// drop the hub when it empties.
    async fn deregister(hubs: &Hubs, topic: &str, user_id: &Uuid) {
        let hub = hubs.read().await.get(topic).cloned();
        let Some(hub) = hub else {
            return;
        };

        if hub.remove_member(user_id).await.is_some() {
            log::info!("{user_id} left {topic}");
        }

        if hub.member_count().await == 0 {
            hubs.write().await.remove(topic);
            log::info!("topic {topic} removed (empty)");
        } else {
            let snapshot = ChannelMessage::presence(topic, &hub.roster().await);
            let _ = hub.broadcast(&snapshot);
        }
    }

    /// Pump frames from a hub receiver into the connection's ordered
    /// outgoing channel.
    fn spawn_forwarder(
        mut rx: broadcast::Receiver<Arc<Vec<u8>>>,
        out_tx: mpsc::Sender<Arc<Vec<u8>>>,
        topic: String,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => {
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("subscriber lagged by {n} frames on {topic}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn stats(&self) -> GatewayStats {
        self.stats.read().await.clone()
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Post, User};

    #[test]
    fn test_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:4600");
        assert_eq!(config.hub_capacity, 256);
        assert_eq!(config.max_members_per_topic, 500);
    }

    #[tokio::test]
    async fn test_stats_initial() {
        let gateway = PushGateway::with_defaults();
        let stats = gateway.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.active_topics, 0);
    }

    #[tokio::test]
    async fn test_publish_to_idle_topic_reaches_nobody() {
        let gateway = PushGateway::with_defaults();
        let handle = gateway.handle();
        let room_id = Uuid::new_v4();
        let event = InboundEvent::PostCreated {
            room_id,
            post: Post::new(room_id, User::new("bob", "Bob"), "anyone?"),
        };
        let delivered = handle.publish("rooms:nowhere", &event).await.unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_roster_absent_for_idle_topic() {
        let gateway = PushGateway::with_defaults();
        let handle = gateway.handle();
        assert!(handle.roster("rooms:nowhere").await.is_none());
        assert!(handle.active_topics().await.is_empty());
    }
}
