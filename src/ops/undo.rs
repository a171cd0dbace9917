use crate::models::{ItemKind, ItemRef};
use crate::ops::delete::DeletedItem;
use crate::ops::engine::OperationEngine;
use crate::ops::error::OpsResult;
use crate::path::VirtualPath;
use crate::store::ObjectStore;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// A completed mutation, described well enough to run it in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum OperationRecord {
    Delete {
        items: Vec<DeletedItem>,
    },
    Rename {
        kind: ItemKind,
        old_path: VirtualPath,
        new_path: VirtualPath,
    },
    Move {
        kind: ItemKind,
        source_path: VirtualPath,
        target_path: VirtualPath,
    },
}

impl OperationRecord {
    pub fn describe(&self) -> String {
        match self {
            OperationRecord::Delete { items } => match items.as_slice() {
                [single] => format!("Delete {}", single.path),
                many => format!("Delete {} items", many.len()),
            },
            OperationRecord::Rename {
                old_path, new_path, ..
            } => format!(
                "Rename {} to {}",
                old_path,
                new_path.name().unwrap_or_default()
            ),
            OperationRecord::Move {
                source_path,
                target_path,
                ..
            } => format!("Move {} to {}", source_path, target_path.parent()),
        }
    }

    /// Folders whose listings change when this record is applied or reversed.
    pub fn affected_parents(&self) -> Vec<VirtualPath> {
        let mut parents: Vec<VirtualPath> = match self {
            OperationRecord::Delete { items } => items.iter().map(|i| i.path.parent()).collect(),
            OperationRecord::Rename {
                old_path, new_path, ..
            } => vec![old_path.parent(), new_path.parent()],
            OperationRecord::Move {
                source_path,
                target_path,
                ..
            } => vec![source_path.parent(), target_path.parent()],
        };
        parents.sort();
        parents.dedup();
        parents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection {
    Undo,
    Redo,
}

#[derive(Debug, Clone, Serialize)]
pub struct UndoResult {
    pub direction: HistoryDirection,
    pub description: String,
    pub leaves_affected: usize,
    pub duration_ms: u64,
    pub affected_parents: Vec<VirtualPath>,
}

/// Two stacks of reversible records. A record lives on exactly one stack at
/// a time; a failed replay puts it back where it came from. Replays never
/// overwrite objects written after the record was made.
#[derive(Debug, Default)]
pub struct HistoryManager {
    undo: Vec<OperationRecord>,
    redo: Vec<OperationRecord>,
    limit: Option<usize>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    /// Push a fresh user operation. Anything that could be redone is gone.
    pub fn record(&mut self, op: OperationRecord) {
        info!(op = %op.describe(), "history recorded");
        self.redo.clear();
        self.push_undo(op);
    }

    fn push_undo(&mut self, op: OperationRecord) {
        self.undo.push(op);
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            let excess = self.undo.len().saturating_sub(limit);
            self.undo.drain(..excess);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn peek_undo(&self) -> Option<&OperationRecord> {
        self.undo.last()
    }

    pub fn peek_redo(&self) -> Option<&OperationRecord> {
        self.redo.last()
    }

    /// Descriptions of the undo stack, most recent first.
    pub fn undo_preview(&self) -> Vec<String> {
        self.undo.iter().rev().map(OperationRecord::describe).collect()
    }

    pub fn redo_preview(&self) -> Vec<String> {
        self.redo.iter().rev().map(OperationRecord::describe).collect()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Reverse the most recent record. `Ok(None)` when there is nothing to
    /// undo.
    pub async fn undo<S>(&mut self, engine: &OperationEngine<S>) -> OpsResult<Option<UndoResult>>
    where
        S: ObjectStore + ?Sized,
    {
        let Some(record) = self.undo.pop() else {
            return Ok(None);
        };
        let started = Instant::now();

        match reverse(&record, engine).await {
            Ok(leaves_affected) => {
                let result = UndoResult {
                    direction: HistoryDirection::Undo,
                    description: record.describe(),
                    leaves_affected,
                    duration_ms: started.elapsed().as_millis() as u64,
                    affected_parents: record.affected_parents(),
                };
                info!(op = %result.description, "undo applied");
                self.redo.push(record);
                Ok(Some(result))
            }
            Err(err) => {
                warn!(op = %record.describe(), error = %err, "undo failed, record kept");
                self.undo.push(record);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone record. `Ok(None)` when there is
    /// nothing to redo.
    pub async fn redo<S>(&mut self, engine: &OperationEngine<S>) -> OpsResult<Option<UndoResult>>
    where
        S: ObjectStore + ?Sized,
    {
        let Some(record) = self.redo.pop() else {
            return Ok(None);
        };
        let started = Instant::now();

        match replay(&record, engine).await {
            Ok(leaves_affected) => {
                let result = UndoResult {
                    direction: HistoryDirection::Redo,
                    description: record.describe(),
                    leaves_affected,
                    duration_ms: started.elapsed().as_millis() as u64,
                    affected_parents: record.affected_parents(),
                };
                info!(op = %result.description, "redo applied");
                self.push_undo(record);
                Ok(Some(result))
            }
            Err(err) => {
                warn!(op = %record.describe(), error = %err, "redo failed, record kept");
                self.redo.push(record);
                Err(err)
            }
        }
    }
}

async fn reverse<S>(record: &OperationRecord, engine: &OperationEngine<S>) -> OpsResult<usize>
where
    S: ObjectStore + ?Sized,
{
    match record {
        OperationRecord::Delete { items } => engine.restore_deleted(items).await,
        OperationRecord::Rename {
            kind,
            old_path,
            new_path,
        } => {
            let current = ItemRef {
                path: new_path.clone(),
                kind: *kind,
            };
            engine.relocate_onto_free(&current, old_path).await
        }
        OperationRecord::Move {
            kind,
            source_path,
            target_path,
        } => {
            let current = ItemRef {
                path: target_path.clone(),
                kind: *kind,
            };
            engine.relocate_onto_free(&current, source_path).await
        }
    }
}

async fn replay<S>(record: &OperationRecord, engine: &OperationEngine<S>) -> OpsResult<usize>
where
    S: ObjectStore + ?Sized,
{
    match record {
        OperationRecord::Delete { items } => engine.delete_captured(items).await,
        OperationRecord::Rename {
            kind,
            old_path,
            new_path,
        } => {
            let current = ItemRef {
                path: old_path.clone(),
                kind: *kind,
            };
            engine.relocate_onto_free(&current, new_path).await
        }
        OperationRecord::Move {
            kind,
            source_path,
            target_path,
        } => {
            let current = ItemRef {
                path: source_path.clone(),
                kind: *kind,
            };
            engine.relocate_onto_free(&current, target_path).await
        }
    }
}
