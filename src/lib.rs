//! Browse and reorganize a file tree kept in a flat, path-keyed object store.
//!
//! The store only knows list/upload/download/delete. Folders, rename, move
//! and undoable deletes are built on top of it here, while a client-side
//! [`TreeCache`] mirrors whatever part of the tree is on screen.

pub mod config;
pub mod manager;
pub mod models;
pub mod ops;
pub mod path;
pub mod selection;
pub mod store;
pub mod tree;

pub use config::TreeConfig;
pub use manager::{FileTreeManager, ManagerSnapshot};
pub use models::{FileItem, FolderItem, Item, ItemId, ItemKind, ItemRef};
pub use ops::{
    ErrorMessage, HistoryManager, OperationEngine, OperationRecord, OpsError, OpsResult,
    RecoveryStrategy,
};
pub use path::VirtualPath;
pub use store::{MemoryStore, ObjectStore, StoreEntry, StoreError};
pub use tree::sort::{SortDirection, SortField, SortSpec};
pub use tree::TreeCache;
