use crate::models::{ItemKind, ItemRef};
use crate::ops::engine::{LeafReport, OperationEngine};
use crate::ops::error::{OpsError, OpsResult};
use crate::path::VirtualPath;
use crate::store::ObjectStore;
use serde::Serialize;
use tracing::info;

/// A completed rename or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub kind: ItemKind,
    pub from: VirtualPath,
    pub to: VirtualPath,
    pub leaves_moved: usize,
}

impl<S> OperationEngine<S>
where
    S: ObjectStore + ?Sized,
{
    /// Rename in place. `Ok(None)` when the name is unchanged.
    pub async fn rename_item(&self, item: &ItemRef, new_name: &str) -> OpsResult<Option<Relocation>> {
        self.check_name(new_name)?;
        if item.path.name() == Some(new_name) {
            return Ok(None);
        }
        if item.path.is_root() {
            return Err(OpsError::InvalidTarget("the root cannot be renamed".to_string()));
        }

        let parent = item.path.parent();
        self.ensure_free(&parent, new_name).await?;

        let to = parent.join(new_name);
        let leaves_moved = self.relocate(item, &to).await?;
        info!(from = %item.path, to = %to, leaves_moved, "item renamed");
        Ok(Some(Relocation {
            kind: item.kind,
            from: item.path.clone(),
            to,
            leaves_moved,
        }))
    }

    /// Move under `destination`, keeping the name. `Ok(None)` with zero store
    /// calls when `destination` already is the parent.
    pub async fn move_item(
        &self,
        item: &ItemRef,
        destination: &VirtualPath,
    ) -> OpsResult<Option<Relocation>> {
        let Some(name) = item.path.name() else {
            return Err(OpsError::InvalidTarget("the root cannot be moved".to_string()));
        };
        check_move_target(item, destination)?;
        if item.path.parent() == *destination {
            return Ok(None);
        }

        self.ensure_folder(destination).await?;
        self.ensure_free(destination, name).await?;

        let to = destination.join(name);
        let leaves_moved = self.relocate(item, &to).await?;
        info!(from = %item.path, to = %to, leaves_moved, "item moved");
        Ok(Some(Relocation {
            kind: item.kind,
            from: item.path.clone(),
            to,
            leaves_moved,
        }))
    }

    /// Fail with `InvalidTarget` unless `path` is listed as a folder.
    async fn ensure_folder(&self, path: &VirtualPath) -> OpsResult<()> {
        let Some(name) = path.name() else {
            return Ok(());
        };
        let entries = self.store().list(&path.parent().to_key()).await?;
        if entries.iter().any(|entry| entry.name == name && entry.is_folder()) {
            Ok(())
        } else {
            Err(OpsError::InvalidTarget(format!("{} is not a folder", path)))
        }
    }

    /// Transfer every leaf of `item` so that `item.path` becomes `to`.
    ///
    /// No collision check happens here; callers run `ensure_free` first.
    pub(crate) async fn relocate(&self, item: &ItemRef, to: &VirtualPath) -> OpsResult<usize> {
        let leaves = self.collect_leaves(item).await?;
        self.transfer_leaves(item, leaves, to).await
    }

    /// Relocate for history replays. Every target key is checked before the
    /// first transfer and any object found there aborts with `Conflict`.
    /// Leaves are enumerated from the live store, so a retry after a partial
    /// failure only sees the ones still left at the source.
    pub(crate) async fn relocate_onto_free(&self, item: &ItemRef, to: &VirtualPath) -> OpsResult<usize> {
        let leaves = self.collect_leaves(item).await?;
        for leaf in &leaves {
            let Some(target) = leaf.rebase(&item.path, to) else {
                continue;
            };
            // An empty marker carries nothing worth keeping.
            if self.is_marker(&target) {
                continue;
            }
            if self.occupant(&target).await?.is_some() {
                return Err(OpsError::Conflict(target));
            }
        }
        self.transfer_leaves(item, leaves, to).await
    }

    async fn transfer_leaves(
        &self,
        item: &ItemRef,
        leaves: Vec<VirtualPath>,
        to: &VirtualPath,
    ) -> OpsResult<usize> {
        if item.kind == ItemKind::File {
            self.transfer_leaf(&item.path, to).await?;
            return Ok(1);
        }

        let mut report = LeafReport::default();
        for leaf in leaves {
            let Some(target) = leaf.rebase(&item.path, to) else {
                continue;
            };
            match self.transfer_leaf(&leaf, &target).await {
                Ok(()) => report.success(leaf),
                Err(err) => report.failure(leaf, err),
            }
        }
        report.finish()
    }
}

/// Local checks for a move; no store calls.
pub fn check_move_target(item: &ItemRef, destination: &VirtualPath) -> OpsResult<()> {
    if item.kind == ItemKind::Folder && destination.starts_with(&item.path) {
        return Err(OpsError::InvalidTarget(format!(
            "cannot move {} into itself",
            item.path
        )));
    }
    Ok(())
}
