//! Edit-permission arbiter
//!
//! Capacity-bounded lease on concurrent editors per file. Denial is an
//! expected, frequent outcome, so every admission decision is a boolean,
//! never an error. The arbiter exposes the raw editor sets for the
//! presentation layer to derive borders and badges from; it renders
//! nothing itself.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use syncroom_core::{FileId, UserId};

/// Per-file concurrent-editor lease, capacity-bounded
pub struct EditPermissionArbiter {
    capacity: usize,
    editors: HashMap<FileId, BTreeSet<UserId>>,
}

impl EditPermissionArbiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            editors: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Request an edit slot. Grants when the file has spare capacity or the
    /// editor already holds a slot (idempotent).
    pub fn request_edit(&mut self, file: &FileId, editor: &UserId) -> bool {
        let set = self.editors.entry(file.clone()).or_default();
        if set.contains(editor) {
            return true;
        }
        if set.len() < self.capacity {
            set.insert(editor.clone());
            debug!(file = %file, editor = %editor, held = set.len(), "edit slot granted");
            true
        } else {
            debug!(file = %file, editor = %editor, "edit slot denied, at capacity");
            false
        }
    }

    /// Release an edit slot. Safe to call when no slot is held.
    pub fn release_edit(&mut self, file: &FileId, editor: &UserId) {
        if let Some(set) = self.editors.get_mut(file) {
            set.remove(editor);
            if set.is_empty() {
                self.editors.remove(file);
            }
        }
    }

    /// Pure admission query with the same logic as [`Self::request_edit`],
    /// for driving read-only rendering without mutating anything.
    pub fn can_edit(&self, file: &FileId, editor: &UserId) -> bool {
        match self.editors.get(file) {
            Some(set) => set.contains(editor) || set.len() < self.capacity,
            None => true,
        }
    }

    /// Current editor set for a file, for presentation-layer derivation.
    pub fn editors(&self, file: &FileId) -> BTreeSet<UserId> {
        self.editors.get(file).cloned().unwrap_or_default()
    }

    pub fn editor_count(&self, file: &FileId) -> usize {
        self.editors.get(file).map(|s| s.len()).unwrap_or(0)
    }

    /// Drop every slot held by an editor, across all files. Called when a
    /// collaborator disconnects.
    pub fn release_all_for(&mut self, editor: &UserId) {
        self.editors.retain(|_, set| {
            set.remove(editor);
            !set.is_empty()
        });
    }

    /// Replace local state with the server's authoritative editor sets.
    ///
    /// Sets beyond capacity are truncated (smallest ids kept) so the local
    /// invariant holds even against a misbehaving server.
    pub fn apply_snapshot(&mut self, file_editors: HashMap<FileId, Vec<UserId>>) {
        self.editors.clear();
        for (file, users) in file_editors {
            if users.is_empty() {
                continue;
            }
            let mut set: BTreeSet<UserId> = users.into_iter().collect();
            if set.len() > self.capacity {
                warn!(file = %file, count = set.len(), capacity = self.capacity,
                    "editor snapshot exceeds capacity, truncating");
                while set.len() > self.capacity {
                    let last = set.last().cloned();
                    if let Some(last) = last {
                        set.remove(&last);
                    }
                }
            }
            self.editors.insert(file, set);
        }
    }
}
