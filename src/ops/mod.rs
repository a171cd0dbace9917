pub mod delete;
pub mod engine;
pub mod error;
pub mod relocate;
pub mod undo;


pub use delete::{BatchDeleteResult, DeletedItem, ItemFailure, Snapshot, SnapshotEntry};
pub use engine::OperationEngine;
pub use error::{
    suggest_recovery_strategy, ErrorMessage, LeafFailure, OpsError, OpsResult, RecoveryStrategy,
};
pub use relocate::{check_move_target, Relocation};
pub use undo::{HistoryDirection, HistoryManager, OperationRecord, UndoResult};
