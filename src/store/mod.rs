//! Object store boundary.
//!
//! The backend only knows flat keys: list-by-prefix, upload, download and
//! delete. Folders are inferred from key prefixes and nothing here is atomic
//! across calls.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryStore, StoreCall, StoreOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One row of a prefix listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoreEntry {
    pub fn file(name: impl Into<String>, size: u64, updated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: Some(size),
            updated_at: Some(updated_at),
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            size: None,
            updated_at: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Adapter over a remote, path-keyed blob store.
///
/// Keys are `/`-joined; the root prefix is the empty string. Implementations
/// own their network timeout policy.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Direct children of `prefix`, files and folders tagged by the backend.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<StoreEntry>>;

    /// Create or overwrite the object at `path`.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<()>;

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>>;

    async fn delete(&self, path: &str) -> StoreResult<()>;
}
