//! Replicated file state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{FileId, UserId};

/// One open file as seen by this replica.
///
/// The authoritative copy lives server-side; a client replica's `version`
/// must never regress (enforced by the file cache, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub file_id: FileId,
    pub content: String,
    /// Monotonic, server-assigned
    pub version: u64,
    pub last_modified: DateTime<Utc>,
    pub last_editor: Option<UserId>,
}

impl FileState {
    pub fn new(file_id: FileId, content: impl Into<String>, version: u64, at: DateTime<Utc>) -> Self {
        Self {
            file_id,
            content: content.into(),
            version,
            last_modified: at,
            last_editor: None,
        }
    }
}
