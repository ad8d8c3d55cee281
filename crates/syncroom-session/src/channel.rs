//! Connection channel and state machine
//!
//! Wraps a [`Transport`] with the lifecycle the rest of the session relies
//! on:
//!
//! ```text
//! Disconnected → Connecting → Connected ⇄ Reconnecting → (Connected | Failed)
//! ```
//!
//! `Failed` is terminal: after the attempt budget is spent the channel
//! stops retrying until an explicit [`Channel::manual_reconnect`]. The
//! channel owns no timer; it reports "schedule a retry" outcomes and the
//! session's scheduler calls [`Channel::try_reconnect`] when the delay
//! elapses, which keeps every transition observable in tests.
//!
//! Frames offered while not connected are dropped, not buffered. Edit
//! durability lives in the mutation queue, so a dropped frame is at worst
//! a missed cursor twitch.

use std::sync::Arc;

use tracing::{debug, info, warn};

use syncroom_core::{ClientMessage, CoreResult};

use crate::transport::Transport;

/// Connection lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the retry delay before attempt `next_attempt`
    Reconnecting { next_attempt: u32 },
    /// Terminal until a manual reconnect
    Failed,
}

/// Lifecycle events surfaced to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connected (or re-connected); the session must re-announce the room
    Connected,
    /// Link lost; a retry should be scheduled
    Disconnected,
    /// A retry attempt failed; another should be scheduled
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted; terminal until manual reconnect
    ReconnectFailed,
}

/// A persistent duplex channel with bounded, fixed-delay reconnection
pub struct Channel {
    transport: Arc<dyn Transport>,
    state: ConnectionState,
    /// Consecutive failed reconnect attempts since the last success
    failed_attempts: u32,
    max_attempts: u32,
}

/// What happened to a frame handed to [`Channel::send`]
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not connected; the frame was discarded
    Dropped,
    /// The send itself failed; the link is now considered lost
    ConnectionLost,
}

impl Channel {
    pub fn new(transport: Arc<dyn Transport>, max_attempts: u32) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            failed_attempts: 0,
            max_attempts,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Initial connect. On failure the channel enters the retry cycle like
    /// any other disconnect.
    pub async fn connect(&mut self) -> ChannelEvent {
        self.state = ConnectionState::Connecting;
        match self.transport.connect().await {
            Ok(()) => {
                info!("channel connected");
                self.state = ConnectionState::Connected;
                self.failed_attempts = 0;
                ChannelEvent::Connected
            }
            Err(e) => {
                warn!(error = %e, "initial connect failed");
                self.begin_retry_cycle()
            }
        }
    }

    /// Note a lost link (failed send, closed recv stream) and enter the
    /// retry cycle. Idempotent while already reconnecting.
    pub fn notify_disconnected(&mut self) -> Option<ChannelEvent> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                warn!("channel disconnected");
                self.begin_retry_cycle();
                Some(ChannelEvent::Disconnected)
            }
            _ => None,
        }
    }

    fn begin_retry_cycle(&mut self) -> ChannelEvent {
        self.failed_attempts = 0;
        self.state = ConnectionState::Reconnecting { next_attempt: 1 };
        ChannelEvent::Disconnected
    }

    /// One reconnect attempt, called by the scheduler after the delay.
    pub async fn try_reconnect(&mut self) -> Option<ChannelEvent> {
        let ConnectionState::Reconnecting { next_attempt } = self.state else {
            return None;
        };
        match self.transport.connect().await {
            Ok(()) => {
                info!(attempt = next_attempt, "reconnected");
                self.state = ConnectionState::Connected;
                self.failed_attempts = 0;
                Some(ChannelEvent::Connected)
            }
            Err(e) => {
                self.failed_attempts += 1;
                if self.failed_attempts >= self.max_attempts {
                    warn!(attempts = self.failed_attempts, error = %e,
                        "reconnect budget exhausted, giving up");
                    self.state = ConnectionState::Failed;
                    Some(ChannelEvent::ReconnectFailed)
                } else {
                    debug!(attempt = next_attempt, error = %e, "reconnect attempt failed");
                    self.state = ConnectionState::Reconnecting {
                        next_attempt: self.failed_attempts + 1,
                    };
                    Some(ChannelEvent::Reconnecting {
                        attempt: self.failed_attempts,
                    })
                }
            }
        }
    }

    /// Explicit user-driven reconnect out of the terminal `Failed` state.
    pub async fn manual_reconnect(&mut self) -> Option<ChannelEvent> {
        if self.state != ConnectionState::Failed {
            return None;
        }
        Some(self.connect().await)
    }

    /// Send a message, dropping it when not connected.
    pub async fn send(&mut self, msg: &ClientMessage) -> CoreResult<SendOutcome> {
        if !self.is_connected() {
            debug!("send while not connected, frame dropped");
            return Ok(SendOutcome::Dropped);
        }
        let frame = msg.encode()?;
        match self.transport.send(frame).await {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(e) => {
                warn!(error = %e, "send failed, marking channel disconnected");
                self.notify_disconnected();
                Ok(SendOutcome::ConnectionLost)
            }
        }
    }

    /// Drop the link state without retrying (session teardown).
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.failed_attempts = 0;
    }
}
