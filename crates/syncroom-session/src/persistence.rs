//! Persistence seam
//!
//! Durable storage is an external collaborator; the session only needs to
//! read file content on a cache miss. Auto-save pushes travel over the
//! wire protocol, not through this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use syncroom_core::{FetchError, FileId};

/// Read access to the durable file store
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Fetch a file's authoritative content and version.
    async fn read_file(&self, file: &FileId) -> Result<(String, u64), FetchError>;
}

/// In-memory store for tests
pub struct InMemoryPersistence {
    files: DashMap<FileId, (String, u64)>,
    /// Files whose reads are scripted to fail
    failing: DashMap<FileId, String>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            failing: DashMap::new(),
        }
    }

    pub fn with_files(files: HashMap<FileId, (String, u64)>) -> Self {
        let store = Self::new();
        for (id, entry) in files {
            store.files.insert(id, entry);
        }
        store
    }

    pub fn insert(&self, file: FileId, content: impl Into<String>, version: u64) {
        self.files.insert(file, (content.into(), version));
    }

    /// Script reads of `file` to fail with `reason`.
    pub fn fail_reads(&self, file: FileId, reason: impl Into<String>) {
        self.failing.insert(file, reason.into());
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn read_file(&self, file: &FileId) -> Result<(String, u64), FetchError> {
        if let Some(reason) = self.failing.get(file) {
            return Err(FetchError::ReadFailed(reason.clone()));
        }
        match self.files.get(file) {
            Some(entry) => Ok(entry.clone()),
            None => Err(FetchError::NotFound(file.to_string())),
        }
    }
}
