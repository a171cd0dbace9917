use crate::models::{ItemKind, ItemRef};
use crate::ops::engine::{LeafReport, OperationEngine};
use crate::ops::error::{LeafFailure, OpsError, OpsResult};
use crate::path::VirtualPath;
use crate::store::{ObjectStore, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub path: VirtualPath,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Content captured before a destructive call: one entry for a file, every
/// descendant object (folder markers included) for a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.bytes.len() as u64).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedItem {
    pub path: VirtualPath,
    pub kind: ItemKind,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub path: VirtualPath,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDeleteResult {
    pub batch_id: String,
    pub deleted: Vec<DeletedItem>,
    pub failed: Vec<ItemFailure>,
    pub total_bytes: u64,
    pub duration_ms: u64,
}

impl BatchDeleteResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<S> OperationEngine<S>
where
    S: ObjectStore + ?Sized,
{
    /// Download every leaf of `item`. Nothing is destroyed here.
    pub async fn capture_snapshot(&self, item: &ItemRef) -> OpsResult<Snapshot> {
        let leaves = self.collect_leaves(item).await?;
        let mut entries = Vec::with_capacity(leaves.len());
        for path in leaves {
            let bytes = self.store().download(&path.to_key()).await?;
            entries.push(SnapshotEntry { path, bytes });
        }
        Ok(Snapshot { entries })
    }

    /// Snapshot first, then delete leaf by leaf.
    ///
    /// If a delete fails, the leaves already removed are uploaded again from
    /// the snapshot so the item is never left half-deleted. Only when that
    /// rollback also fails is a `PartialFailure` reported.
    pub async fn delete_item(&self, item: &ItemRef) -> OpsResult<DeletedItem> {
        if item.path.is_root() {
            return Err(OpsError::InvalidTarget("the root cannot be deleted".to_string()));
        }
        let snapshot = self.capture_snapshot(item).await?;

        for (index, entry) in snapshot.entries.iter().enumerate() {
            if let Err(err) = self.store().delete(&entry.path.to_key()).await {
                let err = OpsError::from(err);
                warn!(path = %entry.path, error = %err, "delete failed, rolling back");
                return Err(self.rollback_delete(&snapshot, index, err).await);
            }
        }

        info!(path = %item.path, leaves = snapshot.len(), "item deleted");
        Ok(DeletedItem {
            path: item.path.clone(),
            kind: item.kind,
            snapshot,
        })
    }

    async fn rollback_delete(&self, snapshot: &Snapshot, failed_at: usize, cause: OpsError) -> OpsError {
        let mut still_deleted = Vec::new();
        for entry in &snapshot.entries[..failed_at] {
            if let Err(err) = self
                .store()
                .upload(&entry.path.to_key(), entry.bytes.clone())
                .await
            {
                warn!(path = %entry.path, error = %err, "rollback upload failed");
                still_deleted.push(entry.path.clone());
            }
        }

        if still_deleted.is_empty() {
            return cause;
        }

        let reason = cause.to_string();
        OpsError::PartialFailure {
            succeeded: still_deleted,
            failed: snapshot.entries[failed_at..]
                .iter()
                .map(|entry| LeafFailure {
                    path: entry.path.clone(),
                    reason: reason.clone(),
                })
                .collect(),
        }
    }

    /// Delete items one after another. Items nested inside another item of
    /// the same batch are folded into their ancestor.
    pub async fn batch_delete(&self, items: &[ItemRef]) -> BatchDeleteResult {
        let started = Instant::now();
        let batch_id = generate_batch_id();

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        let mut total_bytes = 0u64;

        for item in outermost(items) {
            match self.delete_item(item).await {
                Ok(removed) => {
                    total_bytes += removed.snapshot.total_bytes();
                    deleted.push(removed);
                }
                Err(err) => {
                    warn!(path = %item.path, error = %err, batch_id = %batch_id, "batch item failed");
                    failed.push(ItemFailure {
                        path: item.path.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            batch_id = %batch_id,
            deleted = deleted.len(),
            failed = failed.len(),
            "batch delete finished"
        );
        BatchDeleteResult {
            batch_id,
            deleted,
            failed,
            total_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Undo a delete. Every captured key is checked before the first upload:
    /// a key that already holds its captured bytes is left as is, one holding
    /// anything else aborts with `Conflict` and nothing is written.
    pub(crate) async fn restore_deleted(&self, items: &[DeletedItem]) -> OpsResult<usize> {
        let mut pending = Vec::new();
        let mut in_place = Vec::new();
        for entry in items.iter().flat_map(|item| &item.snapshot.entries) {
            match self.occupant(&entry.path).await? {
                None => pending.push(entry),
                Some(bytes) if bytes == entry.bytes => in_place.push(entry.path.clone()),
                Some(_) => return Err(OpsError::Conflict(entry.path.clone())),
            }
        }

        let mut report = LeafReport::default();
        for path in in_place {
            report.success(path);
        }
        for entry in pending {
            match self
                .store()
                .upload(&entry.path.to_key(), entry.bytes.clone())
                .await
            {
                Ok(()) => report.success(entry.path.clone()),
                Err(err) => report.failure(entry.path.clone(), err.into()),
            }
        }
        report.finish()
    }

    /// Redo a delete. Only keys still holding their captured bytes are
    /// removed; anything written there since aborts with `Conflict` before
    /// the first delete.
    pub(crate) async fn delete_captured(&self, items: &[DeletedItem]) -> OpsResult<usize> {
        let mut doomed = Vec::new();
        let mut gone = 0;
        for entry in items.iter().flat_map(|item| &item.snapshot.entries) {
            match self.occupant(&entry.path).await? {
                None => gone += 1,
                Some(bytes) if bytes == entry.bytes => doomed.push(&entry.path),
                Some(_) => return Err(OpsError::Conflict(entry.path.clone())),
            }
        }
        Ok(gone + self.delete_leaves(doomed).await?)
    }

    /// Delete recorded leaves again. Leaves that are already gone count as
    /// deleted.
    async fn delete_leaves<'a, I>(&self, paths: I) -> OpsResult<usize>
    where
        I: IntoIterator<Item = &'a VirtualPath>,
    {
        let mut report = LeafReport::default();
        for path in paths {
            match self.store().delete(&path.to_key()).await {
                Ok(()) | Err(StoreError::NotFound(_)) => report.success(path.clone()),
                Err(err) => report.failure(path.clone(), err.into()),
            }
        }
        report.finish()
    }
}

fn outermost(items: &[ItemRef]) -> Vec<&ItemRef> {
    let mut kept: Vec<&ItemRef> = Vec::new();
    for item in items {
        let covered = items.iter().any(|other| {
            other.kind == ItemKind::Folder && item.path.is_strict_descendant_of(&other.path)
        });
        let duplicate = kept.iter().any(|k| k.path == item.path);
        if !covered && !duplicate {
            kept.push(item);
        }
    }
    kept
}

fn generate_batch_id() -> String {
    format!("delete_{}", Utc::now().timestamp_millis())
}
