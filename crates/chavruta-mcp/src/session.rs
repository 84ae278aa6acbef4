//! SSE session registry with per-session heartbeats
//!
//! A session is minted on SSE connect and owns the outbound channel
//! plus a heartbeat task. The heartbeat doubles as the reaper: when
//! the stream side is gone its send fails, and the session removes
//! itself, cancelling the timer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Heartbeat interval on every open stream
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(25_000);

/// Outbound channel depth per session
const SESSION_CHANNEL_CAPACITY: usize = 32;

/// One server→client SSE message
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub event: &'static str,
    pub data: String,
}

struct Session {
    sender: mpsc::Sender<OutboundMessage>,
    heartbeat: JoinHandle<()>,
}

/// Sessions keyed by opaque id, one registry per MCP server
pub struct SessionRegistry {
    name: &'static str,
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            sessions: DashMap::new(),
        })
    }

    /// Mint a session and its outbound receiver
    pub fn open(self: &Arc<Self>) -> (String, mpsc::Receiver<OutboundMessage>) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::downgrade(self),
            session_id.clone(),
            sender.clone(),
        ));

        self.sessions.insert(session_id.clone(), Session { sender, heartbeat });
        tracing::debug!(server = self.name, session = %session_id, "sse session opened");
        (session_id, receiver)
    }

    /// Sender for a live session
    pub fn sender(&self, session_id: &str) -> Option<mpsc::Sender<OutboundMessage>> {
        self.sessions.get(session_id).map(|s| s.sender.clone())
    }

    /// Drop a session and cancel its heartbeat
    pub fn remove(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            session.heartbeat.abort();
            tracing::debug!(server = self.name, session = %session_id, "sse session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

async fn heartbeat_loop(
    registry: Weak<SessionRegistry>,
    session_id: String,
    sender: mpsc::Sender<OutboundMessage>,
) {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {"level": "debug", "data": "heartbeat"},
    })
    .to_string();

    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await; // first tick fires immediately; skip it

    loop {
        interval.tick().await;
        let message = OutboundMessage {
            event: "message",
            data: payload.clone(),
        };
        if sender.send(message).await.is_err() {
            // Stream side is gone; clean up after ourselves
            if let Some(registry) = registry.upgrade() {
                registry.remove(&session_id);
            }
            return;
        }
        tracing::debug!(session = %session_id, "sse heartbeat sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_register_and_remove() {
        let registry = SessionRegistry::new("test");
        let (id, mut receiver) = registry.open();
        assert_eq!(registry.len(), 1);
        assert!(registry.sender(&id).is_some());

        registry.remove(&id);
        assert!(registry.is_empty());
        assert!(registry.sender(&id).is_none());
        // Outbound channel closes once the session (and heartbeat) is gone
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn session_ids_are_unique() {
        let registry = SessionRegistry::new("test");
        let (a, _ra) = registry.open();
        let (b, _rb) = registry.open();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn dropped_receiver_reaps_the_session() {
        tokio::time::pause();
        let registry = SessionRegistry::new("test");
        let (id, receiver) = registry.open();
        drop(receiver);

        // Advance past one heartbeat; the failed send removes the session
        tokio::time::advance(HEARTBEAT_INTERVAL + Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if registry.sender(&id).is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(registry.sender(&id).is_none());
    }
}
