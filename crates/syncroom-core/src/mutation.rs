//! Edit mutations
//!
//! A [`Mutation`] describes one local edit awaiting server acknowledgment.
//! Indices are character offsets into the document, matching what the
//! editing surface reports.
//!
//! `Replace` swaps the entire buffer: the reference behavior ships whole
//! file content per change instead of positional deltas, trading bandwidth
//! and merge precision for simplicity. Kept as-is; a finer-grained OT/CRDT
//! scheme is an explicit non-goal.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Unique mutation identifier: author + millisecond timestamp + entropy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId(pub String);

impl MutationId {
    /// Generate a fresh id for a mutation authored now
    pub fn generate(author: &UserId, at: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::rng().random_range(0..0xffffff);
        Self(format!("{}-{}-{:06x}", author, at.timestamp_millis(), suffix))
    }
}

/// The shape of an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    /// Insert `text` at character `index`
    Insert { index: usize, text: String },
    /// Delete `length` characters starting at `index`
    Delete { index: usize, length: usize },
    /// Swap the whole buffer for `text` (delete-all-then-insert-all)
    Replace { text: String },
}

/// One pending local edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub id: MutationId,
    pub kind: MutationKind,
    /// Local document version when the mutation was enqueued
    pub version_at_creation: u64,
    pub author: UserId,
}

impl Mutation {
    /// Create a mutation authored by `author` at `at`.
    ///
    /// `version_at_creation` starts at 0; the mutation queue stamps the
    /// real version on enqueue.
    pub fn new(kind: MutationKind, author: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id: MutationId::generate(&author, at),
            kind,
            version_at_creation: 0,
            author,
        }
    }

    /// Apply this mutation to `content`, returning the new content.
    ///
    /// Out-of-range indices clamp to the document bounds rather than
    /// failing: a mutation transformed past the end of a shrunken document
    /// degrades to an append/no-op instead of corrupting the session.
    pub fn apply(&self, content: &str) -> String {
        match &self.kind {
            MutationKind::Insert { index, text } => {
                let chars: Vec<char> = content.chars().collect();
                let at = (*index).min(chars.len());
                let mut out: String = chars[..at].iter().collect();
                out.push_str(text);
                out.extend(&chars[at..]);
                out
            }
            MutationKind::Delete { index, length } => {
                let chars: Vec<char> = content.chars().collect();
                let start = (*index).min(chars.len());
                let end = start.saturating_add(*length).min(chars.len());
                let mut out: String = chars[..start].iter().collect();
                out.extend(&chars[end..]);
                out
            }
            MutationKind::Replace { text } => text.clone(),
        }
    }
}
