//! # Syncroom Core
//!
//! Shared types for the syncroom collaborative editing layer.
//!
//! This crate holds everything the synchronization crates agree on:
//!
//! - [`RoomId`], [`FileId`], [`UserId`]: identity newtypes
//! - [`Mutation`]: a described edit operation pending acknowledgment
//! - [`ClientMessage`] / [`ServerMessage`]: the logical wire protocol
//! - [`Clock`]: time abstraction so freshness rules are testable
//! - [`SyncConfig`]: every timing constant and capacity in one place
//!
//! Higher layers live in `syncroom-sync` (pure state machines) and
//! `syncroom-session` (transport, timers, the per-room facade).

pub mod clock;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod file;
pub mod identity;
pub mod mutation;
pub mod protocol;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborator::Collaborator;
pub use config::SyncConfig;
pub use error::{CodecError, CoreResult, FetchError, SessionError, SyncError, TransportError};
pub use file::FileState;
pub use identity::{Color, FileId, RoomId, UserId, collaborator_color};
pub use mutation::{Mutation, MutationId, MutationKind};
pub use protocol::{ClientMessage, CursorPosition, ServerMessage, UserDescriptor};
