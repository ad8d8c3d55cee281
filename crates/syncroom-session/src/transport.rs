//! Transport abstraction
//!
//! The session never talks to a socket directly; it sends and receives
//! opaque frames through the [`Transport`] trait. Production embedders
//! supply a websocket- or QUIC-backed implementation; tests use
//! [`MockTransport`], which scripts connect failures and lets a test play
//! the server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use syncroom_core::{ClientMessage, ServerMessage, TransportError};

/// A duplex frame transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish (or re-establish) the underlying connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Send one frame. Fails when the connection is down.
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Receive the next inbound frame. `None` means the connection closed.
    async fn recv(&self) -> Option<Vec<u8>>;
}

/// In-memory transport for tests
///
/// The test side injects [`ServerMessage`]s and inspects decoded outbound
/// [`ClientMessage`]s. Connect attempts can be scripted to fail, and the
/// link can be cut to simulate a network drop.
pub struct MockTransport {
    connected: AtomicBool,
    /// How many upcoming `connect()` calls fail before one succeeds
    connect_failures: AtomicU32,
    sent: Mutex<Vec<ClientMessage>>,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            connected: AtomicBool::new(false),
            connect_failures: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
        })
    }

    /// Script the next `count` connect attempts to fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Cut the link; subsequent sends fail until the next `connect()`.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Play the server: push a message toward the client.
    pub fn inject(&self, msg: &ServerMessage) {
        let frame = msg.encode().expect("mock message encodes");
        let _ = self.inbound_tx.send(frame);
    }

    /// Push a raw (possibly malformed) frame toward the client.
    pub fn inject_raw(&self, frame: Vec<u8>) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Everything the client sent so far, decoded, oldest first.
    pub async fn sent_messages(&self) -> Vec<ClientMessage> {
        self.sent.lock().await.clone()
    }

    /// Drop the recorded outbound history.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            debug!(remaining = remaining - 1, "mock connect failed as scripted");
            return Err(TransportError::ConnectionFailed("scripted failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let msg = ClientMessage::decode(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.sent.lock().await.push(msg);
        Ok(())
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.inbound_rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncroom_core::{RoomId, UserId};

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = MockTransport::new();
        let msg = ClientMessage::LeaveRoom {
            room: RoomId::new("r1"),
            user: UserId::new("u1"),
        };
        assert!(transport.send(msg.encode().unwrap()).await.is_err());

        transport.connect().await.unwrap();
        transport.send(msg.encode().unwrap()).await.unwrap();
        assert_eq!(transport.sent_messages().await, vec![msg]);
    }

    #[tokio::test]
    async fn test_scripted_connect_failures() {
        let transport = MockTransport::new();
        transport.fail_next_connects(2);
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_inject_and_recv() {
        let transport = MockTransport::new();
        let msg = ServerMessage::UserLeft {
            user: UserId::new("u2"),
        };
        transport.inject(&msg);
        let frame = transport.recv().await.unwrap();
        assert_eq!(ServerMessage::decode(&frame).unwrap(), msg);
    }
}
