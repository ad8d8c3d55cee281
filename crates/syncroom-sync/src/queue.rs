//! Mutation queue and index transformer
//!
//! Holds the local author's edits that the server has not yet echoed back.
//! Remote mutations are never queued; they are transformed against the
//! queue and applied immediately.
//!
//! ## Transform rule
//!
//! A remote operation's index was computed against a document that did not
//! include our pending local edits, so before applying it locally:
//!
//! - a queued insert at or before the remote index shifts the remote index
//!   forward by the inserted length
//! - a queued delete strictly before the remote index shifts it backward by
//!   the overlap
//!
//! When a queued insert sits at exactly the remote index, both sides
//! inserted at the same spot concurrently. The tie-break is author-id
//! lexicographic order: the smaller author id is treated as having
//! inserted first, and the other side shifts. Both replicas evaluate the
//! same comparison, so the outcome is deterministic rather than
//! timing-dependent, and concurrent same-index inserts converge.
//!
//! After a transformed remote op is applied to the local buffer, the
//! queued local indices themselves are stale; [`MutationQueue::rebase_after_remote`]
//! shifts them by the same rules with the roles swapped.

use std::collections::VecDeque;

use tracing::debug;

use syncroom_core::{Mutation, MutationId, MutationKind, UserId};

/// FIFO queue of the local author's unacknowledged edits
pub struct MutationQueue {
    author: UserId,
    local_version: u64,
    pending: VecDeque<Mutation>,
}

impl MutationQueue {
    pub fn new(author: UserId) -> Self {
        Self {
            author,
            local_version: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn local_version(&self) -> u64 {
        self.local_version
    }

    /// Record a newer server-observed version.
    ///
    /// Ignores regressions; the version a queue stamps is monotonic.
    pub fn observe_version(&mut self, version: u64) {
        if version > self.local_version {
            self.local_version = version;
        }
    }

    /// Append a local edit, stamping the current local version.
    ///
    /// Returns the stamped mutation, ready to send.
    pub fn enqueue_local(&mut self, mut mutation: Mutation) -> Mutation {
        debug_assert_eq!(mutation.author, self.author);
        mutation.version_at_creation = self.local_version;
        self.pending.push_back(mutation.clone());
        mutation
    }

    /// Remove the queued entry matching a server echo of our own edit.
    ///
    /// Returns false when no entry matches (already acknowledged, or an
    /// echo from before a reconnect).
    pub fn acknowledge(&mut self, id: &MutationId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|m| &m.id != id);
        let removed = self.pending.len() < before;
        if !removed {
            debug!(mutation = %id.0, "acknowledge for unknown mutation ignored");
        }
        removed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Mutation> {
        self.pending.iter()
    }

    /// Transform a remote mutation's index against every queued local edit,
    /// in queue (issue) order.
    pub fn transform_incoming(&self, mut remote: Mutation) -> Mutation {
        let remote_author = remote.author.clone();
        let index = match &mut remote.kind {
            MutationKind::Insert { index, .. } => index,
            MutationKind::Delete { index, .. } => index,
            // Whole-buffer replace has no position to transform.
            MutationKind::Replace { .. } => return remote,
        };

        for local in &self.pending {
            match &local.kind {
                MutationKind::Insert { index: li, text } => {
                    let len = text.chars().count();
                    if *li < *index || (*li == *index && self.author < remote_author) {
                        *index += len;
                    }
                }
                MutationKind::Delete { index: li, length } => {
                    if *li < *index {
                        *index -= (*index - *li).min(*length);
                    }
                }
                MutationKind::Replace { .. } => {}
            }
        }
        remote
    }

    /// Shift queued local indices after `remote` has been applied to the
    /// local buffer. Same rules as [`Self::transform_incoming`] with the
    /// roles swapped.
    pub fn rebase_after_remote(&mut self, remote: &Mutation) {
        let (remote_index, remote_insert_len, remote_delete_len) = match &remote.kind {
            MutationKind::Insert { index, text } => (*index, text.chars().count(), 0),
            MutationKind::Delete { index, length } => (*index, 0, *length),
            MutationKind::Replace { .. } => return,
        };

        for local in &mut self.pending {
            let index = match &mut local.kind {
                MutationKind::Insert { index, .. } => index,
                MutationKind::Delete { index, .. } => index,
                MutationKind::Replace { .. } => continue,
            };
            if remote_insert_len > 0 {
                if remote_index < *index
                    || (remote_index == *index && remote.author < self.author)
                {
                    *index += remote_insert_len;
                }
            } else if remote_index < *index {
                *index -= (*index - remote_index).min(remote_delete_len);
            }
        }
    }
}
