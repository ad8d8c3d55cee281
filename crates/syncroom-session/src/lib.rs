//! # Syncroom Session
//!
//! The I/O half of the synchronization layer: the connection channel and
//! its reconnect state machine, the cancellable timer scheduler, the
//! cursor broadcaster, and the per-room [`RoomSession`] facade that the
//! editing surface and file tree talk to.
//!
//! ## Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use syncroom_core::{RoomId, SyncConfig, SystemClock, UserDescriptor, UserId, collaborator_color};
//! use syncroom_session::{InMemoryPersistence, MockTransport, RoomSession};
//!
//! let user_id = UserId::new("u1");
//! let user = UserDescriptor {
//!     color: collaborator_color(&user_id),
//!     name: "Ada".into(),
//!     id: user_id,
//! };
//! let (mut session, mut events, mut timers) = RoomSession::new(
//!     RoomId::new("room-1"),
//!     user,
//!     SyncConfig::default(),
//!     Arc::new(SystemClock),
//!     MockTransport::new(),
//!     Arc::new(InMemoryPersistence::new()),
//! );
//!
//! session.join().await?;
//! // Drive: forward frames to session.pump_inbound() / handle_server_message(),
//! // expired timers to session.handle_timer(), and render `events`.
//! ```

pub mod broadcaster;
pub mod channel;
pub mod persistence;
pub mod scheduler;
pub mod session;
pub mod transport;

// Re-exports
pub use broadcaster::{CursorBroadcaster, ThrottleDecision};
pub use channel::{Channel, ChannelEvent, ConnectionState, SendOutcome};
pub use persistence::{InMemoryPersistence, PersistenceService};
pub use scheduler::Scheduler;
pub use session::{RoomSession, SessionEvent, SessionTimer};
pub use transport::{MockTransport, Transport};
