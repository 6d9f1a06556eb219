//! Discovery engine: periodic presence broadcast, packet receive loop, and
//! the facade the shell calls into.
//!
//! Two tasks share the transport: the announce loop broadcasts the local
//! username at a fixed interval, the receive loop dispatches inbound
//! datagrams to the peer table or the conversation store. Neither loop ever
//! dies on a network or decode error; they only exit on `stop`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lanchat_core::message::{conversation_id, Message};
use lanchat_core::packet::{decode_packet, encode_packet, Packet};
use lanchat_core::peers::{Peer, PeerTable};
use lanchat_core::store::ConversationStore;

use crate::transport::{Transport, TransportError, MAX_DATAGRAM};

/// Observational callback fed one text line per notable engine event.
/// Never affects control flow.
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// UDP port shared by broadcast and unicast.
    pub port: u16,
    /// Age beyond which a peer is considered offline and evicted.
    pub peer_timeout: Duration,
    /// Period of the presence broadcast.
    pub broadcast_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown peer: {0}")]
    PeerUnknown(String),
    #[error("engine is not running")]
    NotRunning,
    #[error("engine was stopped and cannot be restarted")]
    Stopped,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Encode(#[from] lanchat_core::packet::PacketEncodeError),
}

/// Events channel to the external debug view. Lines are dropped silently
/// while disabled; `tracing` output is unconditional.
#[derive(Clone)]
struct EventLog {
    sink: Option<DebugSink>,
    enabled: Arc<AtomicBool>,
}

impl EventLog {
    fn emit(&self, line: &str) {
        debug!("{line}");
        if self.enabled.load(Ordering::Relaxed) {
            if let Some(sink) = &self.sink {
                sink(line);
            }
        }
    }
}

struct Running {
    transport: Arc<Transport>,
    tasks: Vec<JoinHandle<()>>,
}

/// Facade over transport, loops, peer table, and conversation store. All
/// methods are safe to call concurrently with the running loops.
pub struct DiscoveryEngine {
    username: String,
    config: EngineConfig,
    peers: Arc<PeerTable>,
    store: Arc<ConversationStore>,
    log: EventLog,
    stop: CancellationToken,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl DiscoveryEngine {
    pub fn new(username: impl Into<String>, config: EngineConfig) -> Self {
        Self::with_debug_sink(username, config, None)
    }

    pub fn with_debug_sink(
        username: impl Into<String>,
        config: EngineConfig,
        sink: Option<DebugSink>,
    ) -> Self {
        Self {
            username: username.into(),
            config,
            peers: Arc::new(PeerTable::new()),
            store: Arc::new(ConversationStore::new()),
            log: EventLog {
                sink,
                enabled: Arc::new(AtomicBool::new(false)),
            },
            stop: CancellationToken::new(),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Turn the debug sink on or off at runtime.
    pub fn set_debug(&self, enabled: bool) {
        self.log.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Bind the transport and launch both loops. Returns once they are
    /// spawned; a second call while running is a no-op. The engine is
    /// single-shot: after `stop` it cannot be started again.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }
        if self.stop.is_cancelled() {
            return Err(EngineError::Stopped);
        }
        let transport = Arc::new(Transport::bind(self.config.port)?);
        self.log
            .emit(&format!("listening for packets on port {}", transport.port()));

        let announce = tokio::spawn(announce_loop(
            transport.clone(),
            self.username.clone(),
            self.config.broadcast_interval,
            self.stop.clone(),
            self.log.clone(),
        ));
        let receive = tokio::spawn(receive_loop(
            transport.clone(),
            self.username.clone(),
            self.peers.clone(),
            self.store.clone(),
            self.log.clone(),
        ));
        *running = Some(Running {
            transport,
            tasks: vec![announce, receive],
        });
        Ok(())
    }

    /// Stop both loops and close the socket. Waits until neither loop is
    /// alive before returning. Idempotent; the peer table and message store
    /// stay readable afterwards as a frozen view.
    pub async fn stop(&self) {
        self.stop.cancel();
        let mut running = self.running.lock().await;
        if let Some(state) = running.take() {
            state.transport.close();
            for task in state.tasks {
                if let Err(err) = task.await {
                    warn!(error = %err, "engine task did not shut down cleanly");
                }
            }
            self.log.emit("engine stopped");
        }
    }

    /// Currently live peers. Evicts anything older than the configured
    /// timeout as a side effect.
    pub fn list_peers(&self) -> Vec<Peer> {
        self.peers
            .list_active(Instant::now(), self.config.peer_timeout)
    }

    /// Build, send, and record a direct message to a known peer. Fails with
    /// [`EngineError::PeerUnknown`] if `recipient` is absent from the table;
    /// there is no implicit re-discovery. A send accepted by the socket is
    /// reported as success whether or not the datagram survives the wire.
    pub async fn send_message(
        &self,
        recipient: &str,
        title: &str,
        content: &str,
        conversation: Option<String>,
        reply_to: Option<String>,
    ) -> Result<Message, EngineError> {
        let peer = self
            .peers
            .get(recipient)
            .ok_or_else(|| EngineError::PeerUnknown(recipient.to_string()))?;

        let conversation =
            conversation.unwrap_or_else(|| conversation_id(&self.username, recipient));
        let message = Message::new(
            self.username.clone(),
            recipient,
            title,
            content,
            Some(conversation),
            reply_to,
        );
        let payload = encode_packet(&Packet::Message {
            data: message.clone(),
        })?;

        let running = self.running.lock().await;
        let state = running.as_ref().ok_or(EngineError::NotRunning)?;
        // Unicast to the peer's last-seen IP at the shared protocol port,
        // not the source port of its announcement.
        let dest = SocketAddr::new(peer.address.ip(), state.transport.port());
        state.transport.send_to(dest, &payload).await?;
        drop(running);

        self.store.record(message.clone());
        self.log
            .emit(&format!("sent message to {recipient} at {dest}: {title}"));
        Ok(message)
    }

    /// All stored messages, or only those exchanged with one peer.
    pub fn list_messages(&self, peer: Option<&str>) -> Vec<Message> {
        match peer {
            Some(username) => self.store.for_peer(username),
            None => self.store.all(),
        }
    }

    /// Messages in one conversation, insertion order.
    pub fn get_conversation(&self, conversation_id: &str) -> Vec<Message> {
        self.store.for_conversation(conversation_id)
    }
}

/// Broadcast a presence announcement every `interval` until stopped. A
/// failed send is logged and retried at the next tick, with no backoff.
async fn announce_loop(
    transport: Arc<Transport>,
    username: String,
    interval: Duration,
    stop: CancellationToken,
    log: EventLog,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let packet = Packet::Announcement {
            username: username.clone(),
            timestamp: Utc::now(),
        };
        let payload = match encode_packet(&packet) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode announcement");
                continue;
            }
        };
        match transport.broadcast(&payload).await {
            Ok(()) => log.emit(&format!("broadcasting presence: {username}")),
            Err(TransportError::Closed) => break,
            Err(err) => {
                warn!(error = %err, "broadcast failed");
                log.emit(&format!("broadcast error: {err}"));
            }
        }
    }
}

/// Receive datagrams until the transport closes. Malformed packets are
/// dropped and logged; announcements feed the peer table, messages addressed
/// to us are restamped with receipt time and recorded.
async fn receive_loop(
    transport: Arc<Transport>,
    username: String,
    peers: Arc<PeerTable>,
    store: Arc<ConversationStore>,
    log: EventLog,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, from) = match transport.recv(&mut buf).await {
            Ok(received) => received,
            Err(TransportError::Closed) => break,
            Err(err) => {
                warn!(error = %err, "receive failed");
                log.emit(&format!("packet receiving error: {err}"));
                continue;
            }
        };
        let packet = match decode_packet(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                log.emit(&format!("dropping malformed datagram from {from}: {err}"));
                continue;
            }
        };
        match packet {
            Packet::Announcement { username: who, .. } => {
                // Our own broadcasts loop back through the shared socket.
                if who == username {
                    continue;
                }
                peers.upsert(&who, from, Instant::now());
                log.emit(&format!("updated peer: {who} at {from}"));
            }
            Packet::Message { data } => {
                if data.recipient != username {
                    continue;
                }
                let mut message = data;
                // Receipt-time policy: the receiver's clock wins.
                message.timestamp = Utc::now();
                log.emit(&format!(
                    "received message from {}: {}",
                    message.sender, message.title
                ));
                store.record(message);
            }
        }
    }
}
