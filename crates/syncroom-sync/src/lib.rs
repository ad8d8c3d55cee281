//! # Syncroom Sync
//!
//! The pure state machines of the synchronization layer. Nothing here does
//! I/O or owns a timer; every struct is driven by explicit calls from the
//! session event loop in `syncroom-session`, which is what makes the
//! ordering rules testable without a network.
//!
//! ## Components
//!
//! - [`PresenceRegistry`]: roster of non-self collaborators
//! - [`MutationQueue`]: pending local edits + index transform of remote ops
//! - [`FileCache`]: versioned per-file content cache with freshness and a
//!   pending-fetch guard
//! - [`EditPermissionArbiter`]: capacity-bounded concurrent-editor lease
//!
//! All of them are plain owned values, meant to live as fields of one
//! per-room session object. No module-level singletons, so multiple rooms
//! (and tests) are isolated by construction.

pub mod arbiter;
pub mod cache;
pub mod presence;
pub mod queue;

// Re-exports
pub use arbiter::EditPermissionArbiter;
pub use cache::FileCache;
pub use presence::{PresenceEvent, PresenceRegistry};
pub use queue::MutationQueue;
