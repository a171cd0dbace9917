//! Request/response facade over the cache, the engine and history.
//!
//! `FileTreeManager` is the only place that records history, so a move made
//! by dragging and one made from a "Move to" dialog produce the same record.
//! Mutating calls go through an [`OperationGate`]; browsing does not.

pub mod gate;

#[cfg(test)]
mod tests;

use crate::config::TreeConfig;
use crate::models::{Item, ItemId, ItemRef};
use crate::ops::{
    BatchDeleteResult, DeletedItem, HistoryManager, OperationEngine, OperationRecord, OpsError,
    OpsResult, Relocation, UndoResult,
};
use crate::path::VirtualPath;
use crate::selection::{Breadcrumb, Cursor, DragState, DropOutcome, Navigator, SelectionSet};
use crate::store::ObjectStore;
use crate::tree::sort::SortSpec;
use crate::tree::{ToggleOutcome, TreeCache, TreeSnapshot, VisibleItem};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use gate::{GateGuard, OperationGate};

#[derive(Debug, Default)]
struct ViewState {
    navigator: Navigator,
    selection: SelectionSet,
    cursor: Cursor,
    drag: DragState,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub tree: TreeSnapshot,
    pub current_path: VirtualPath,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub visible: Vec<VisibleItem>,
    pub selection: SelectionSet,
    pub cursor: Option<usize>,
    pub drag: DragState,
    pub can_undo: bool,
    pub can_redo: bool,
    pub busy: bool,
}

pub struct FileTreeManager<S: ?Sized> {
    engine: OperationEngine<S>,
    cache: Mutex<TreeCache>,
    history: tokio::sync::Mutex<HistoryManager>,
    view: Mutex<ViewState>,
    gate: OperationGate,
}

impl<S> FileTreeManager<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: TreeConfig) -> Self {
        Self {
            cache: Mutex::new(TreeCache::new(config.clone())),
            history: tokio::sync::Mutex::new(HistoryManager::with_limit(config.history_limit)),
            view: Mutex::new(ViewState::default()),
            gate: OperationGate::new(),
            engine: OperationEngine::new(store, config),
        }
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    pub fn get_config(&self) -> &TreeConfig {
        self.engine.get_config()
    }

    pub fn update_config(&mut self, config: TreeConfig) {
        self.cache.get_mut().update_config(config.clone());
        self.history.get_mut().set_limit(config.history_limit);
        self.engine.update_config(config);
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Load `path` as the navigated folder.
    pub async fn open(&self, path: VirtualPath) -> OpsResult<()> {
        let entries = self.store().list(&path.to_key()).await?;
        self.cache.lock().set_root(path.clone(), entries);

        let mut view = self.view.lock();
        view.navigator = Navigator::at(path.clone());
        view.selection.exit();
        view.cursor = Cursor::default();
        view.drag.cancel();
        info!(path = %path, "folder opened");
        Ok(())
    }

    pub fn current_path(&self) -> VirtualPath {
        self.view.lock().navigator.current_path().clone()
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.view.lock().navigator.breadcrumbs()
    }

    pub async fn navigate_into(&self, id: ItemId) -> OpsResult<()> {
        let item = self.item(id)?;
        let mut navigator = self.view.lock().navigator.clone();
        let target = navigator.navigate_into(&item)?.clone();
        self.open(target).await
    }

    /// `Ok(false)` at the root.
    pub async fn navigate_up(&self) -> OpsResult<bool> {
        let mut navigator = self.view.lock().navigator.clone();
        if !navigator.navigate_up() {
            return Ok(false);
        }
        self.open(navigator.current_path().clone()).await?;
        Ok(true)
    }

    pub async fn navigate_to_breadcrumb(&self, path: &VirtualPath) -> OpsResult<()> {
        let mut navigator = self.view.lock().navigator.clone();
        let target = navigator.navigate_to_breadcrumb(path)?.clone();
        self.open(target).await
    }

    /// Sorted children of any folder, without caching them.
    pub async fn list_children(&self, path: &VirtualPath) -> OpsResult<Vec<Item>> {
        let entries = self.store().list(&path.to_key()).await?;
        Ok(self.cache.lock().build_items(path, entries))
    }

    pub async fn toggle_expand(&self, id: ItemId) -> OpsResult<ToggleOutcome> {
        let outcome = self.cache.lock().begin_toggle(id)?;
        let outcome = match outcome {
            ToggleOutcome::NeedsLoad(path) => {
                let entries = self.store().list(&path.to_key()).await?;
                self.cache.lock().complete_expand(&path, entries);
                ToggleOutcome::Expanded
            }
            done => done,
        };
        self.sync_view();
        Ok(outcome)
    }

    /// Re-list every folder level the cache holds.
    pub async fn refresh(&self) -> OpsResult<()> {
        let loaded = self.cache.lock().is_root_loaded();
        if !loaded {
            return self.open(self.current_path()).await;
        }
        let levels = self.cache.lock().loaded_levels();
        self.relist(&levels).await?;
        self.sync_view();
        Ok(())
    }

    pub fn set_sort(&self, spec: SortSpec) {
        self.cache.lock().set_sort(spec);
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.cache.lock().sort_spec()
    }

    pub fn visible_items(&self) -> Vec<VisibleItem> {
        self.cache.lock().flatten_visible()
    }

    pub fn find_item(&self, id: ItemId) -> Option<Item> {
        self.cache.lock().find_by_id(id).cloned()
    }

    pub async fn download_file(&self, id: ItemId) -> OpsResult<Vec<u8>> {
        let item = self.item_ref(id)?;
        self.engine.download_file(&item.path).await
    }

    pub async fn snapshot(&self) -> ManagerSnapshot {
        let (tree, visible) = {
            let cache = self.cache.lock();
            (cache.snapshot(), cache.flatten_visible())
        };
        let (current_path, breadcrumbs, selection, cursor, drag) = {
            let view = self.view.lock();
            (
                view.navigator.current_path().clone(),
                view.navigator.breadcrumbs(),
                view.selection.clone(),
                view.cursor.index(),
                view.drag.clone(),
            )
        };
        // A replay holds the history lock across store calls; report it as
        // busy instead of waiting for it.
        let (can_undo, can_redo, replaying) = match self.history.try_lock() {
            Ok(history) => (history.can_undo(), history.can_redo(), false),
            Err(_) => (false, false, true),
        };
        ManagerSnapshot {
            tree,
            current_path,
            breadcrumbs,
            visible,
            selection,
            cursor,
            drag,
            can_undo,
            can_redo,
            busy: replaying || self.gate.is_busy(),
        }
    }

    pub fn toggle_select(&self, id: ItemId) -> bool {
        self.view.lock().selection.toggle(id)
    }

    pub fn select_all(&self) {
        let visible = self.visible_items();
        self.view.lock().selection.select_all(&visible);
    }

    pub fn clear_selection(&self) {
        self.view.lock().selection.clear();
    }

    pub fn exit_selection(&self) {
        self.view.lock().selection.exit();
    }

    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.view.lock().selection.ids()
    }

    pub fn cursor_next(&self) {
        let len = self.visible_items().len();
        self.view.lock().cursor.next(len);
    }

    pub fn cursor_prev(&self) {
        let len = self.visible_items().len();
        self.view.lock().cursor.prev(len);
    }

    pub fn cursor_first(&self) {
        let len = self.visible_items().len();
        self.view.lock().cursor.first(len);
    }

    pub fn cursor_last(&self) {
        let len = self.visible_items().len();
        self.view.lock().cursor.last(len);
    }

    pub fn focused(&self) -> Option<VisibleItem> {
        let visible = self.visible_items();
        self.view.lock().cursor.current(&visible).cloned()
    }

    pub async fn create_folder(&self, parent: &VirtualPath, name: &str) -> OpsResult<Option<ItemId>> {
        let _guard = self.gate.try_acquire()?;
        match self.engine.create_folder(parent, name).await {
            Ok(entry) => Ok(self.cache.lock().insert(parent, entry)),
            Err(err) => {
                self.resync_after_failure(&err, &[parent.clone()]).await;
                Err(err)
            }
        }
    }

    pub async fn upload_file(
        &self,
        parent: &VirtualPath,
        name: &str,
        bytes: Vec<u8>,
    ) -> OpsResult<Option<ItemId>> {
        let _guard = self.gate.try_acquire()?;
        match self.engine.upload_file(parent, name, bytes).await {
            Ok(entry) => Ok(self.cache.lock().insert(parent, entry)),
            Err(err) => {
                self.resync_after_failure(&err, &[parent.clone()]).await;
                Err(err)
            }
        }
    }

    /// `Ok(None)` when the name did not change.
    pub async fn rename_item(&self, id: ItemId, new_name: &str) -> OpsResult<Option<Relocation>> {
        let _guard = self.gate.try_acquire()?;
        let item = self.item_ref(id)?;

        match self.engine.rename_item(&item, new_name).await {
            Ok(Some(relocation)) => {
                self.apply_relocation(&relocation.from, &relocation.to);
                self.history.lock().await.record(OperationRecord::Rename {
                    kind: relocation.kind,
                    old_path: relocation.from.clone(),
                    new_path: relocation.to.clone(),
                });
                Ok(Some(relocation))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.resync_after_failure(&err, &[item.path.parent()]).await;
                Err(err)
            }
        }
    }

    pub async fn move_item(&self, id: ItemId, destination: &VirtualPath) -> OpsResult<Option<Relocation>> {
        let _guard = self.gate.try_acquire()?;
        let item = self.item_ref(id)?;
        self.run_move(&item, destination).await
    }

    /// The single recording point for moves.
    async fn run_move(&self, item: &ItemRef, destination: &VirtualPath) -> OpsResult<Option<Relocation>> {
        match self.engine.move_item(item, destination).await {
            Ok(Some(relocation)) => {
                self.apply_relocation(&relocation.from, &relocation.to);
                self.history.lock().await.record(OperationRecord::Move {
                    kind: relocation.kind,
                    source_path: relocation.from.clone(),
                    target_path: relocation.to.clone(),
                });
                Ok(Some(relocation))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.resync_after_failure(&err, &[item.path.parent(), destination.clone()])
                    .await;
                Err(err)
            }
        }
    }

    pub async fn delete_item(&self, id: ItemId) -> OpsResult<DeletedItem> {
        let _guard = self.gate.try_acquire()?;
        let item = self.item_ref(id)?;

        match self.engine.delete_item(&item).await {
            Ok(deleted) => {
                self.apply_removal(&deleted.path);
                self.sync_view();
                self.history.lock().await.record(OperationRecord::Delete {
                    items: vec![deleted.clone()],
                });
                Ok(deleted)
            }
            Err(err) => {
                self.resync_after_failure(&err, &[item.path.parent()]).await;
                Err(err)
            }
        }
    }

    pub async fn batch_delete(&self, ids: &[ItemId]) -> OpsResult<BatchDeleteResult> {
        let _guard = self.gate.try_acquire()?;
        let items = ids
            .iter()
            .map(|id| self.item_ref(*id))
            .collect::<OpsResult<Vec<_>>>()?;
        Ok(self.run_batch_delete(&items).await)
    }

    /// Delete everything selected and leave multi-select mode.
    pub async fn delete_selected(&self) -> OpsResult<BatchDeleteResult> {
        let _guard = self.gate.try_acquire()?;
        let items: Vec<ItemRef> = {
            let ids = self.view.lock().selection.ids();
            let cache = self.cache.lock();
            ids.iter()
                .filter_map(|id| cache.find_by_id(*id).map(ItemRef::from))
                .collect()
        };
        let result = self.run_batch_delete(&items).await;
        self.view.lock().selection.exit();
        Ok(result)
    }

    async fn run_batch_delete(&self, items: &[ItemRef]) -> BatchDeleteResult {
        let result = self.engine.batch_delete(items).await;

        for deleted in &result.deleted {
            self.apply_removal(&deleted.path);
        }
        if !result.deleted.is_empty() {
            self.history.lock().await.record(OperationRecord::Delete {
                items: result.deleted.clone(),
            });
        }
        if !result.is_complete() {
            let parents: Vec<VirtualPath> =
                result.failed.iter().map(|f| f.path.parent()).collect();
            if let Err(err) = self.relist(&parents).await {
                warn!(error = %err, "re-listing after batch delete failed");
            }
        }
        self.sync_view();
        result
    }

    pub fn begin_drag(&self, id: ItemId) -> OpsResult<()> {
        let item = self.item_ref(id)?;
        self.view.lock().drag.begin(item);
        Ok(())
    }

    pub fn hover_drag(&self, target: ItemId) -> OpsResult<()> {
        let target = self.item_ref(target)?;
        self.view.lock().drag.hover(&target);
        Ok(())
    }

    pub fn leave_drag_target(&self) {
        self.view.lock().drag.leave();
    }

    pub fn cancel_drag(&self) {
        self.view.lock().drag.cancel();
    }

    pub fn drag_state(&self) -> DragState {
        self.view.lock().drag.clone()
    }

    /// Drop the dragged item on `target`. Dropping on its own parent is a
    /// successful no-op; invalid targets fail without store calls.
    pub async fn drop_dragged(&self, target: ItemId) -> OpsResult<Option<Relocation>> {
        let _guard = self.gate.try_acquire()?;
        let target = match self.item_ref(target) {
            Ok(target) => target,
            Err(err) => {
                self.view.lock().drag.cancel();
                return Err(err);
            }
        };

        let outcome = self.view.lock().drag.drop_on(&target);
        match outcome {
            DropOutcome::NoOp => {
                debug!(target = %target.path, "drop on current parent ignored");
                Ok(None)
            }
            DropOutcome::Rejected(reason) => Err(OpsError::InvalidTarget(reason)),
            DropOutcome::Move { item, destination } => {
                let result = self.run_move(&item, &destination).await;
                self.view.lock().drag.reset();
                result
            }
        }
    }

    pub async fn undo(&self) -> OpsResult<Option<UndoResult>> {
        let _guard = self.gate.try_acquire()?;
        let mut history = self.history.lock().await;
        let relocation = history.peek_undo().and_then(relocation_of);
        let parents = history
            .peek_undo()
            .map(OperationRecord::affected_parents)
            .unwrap_or_default();

        match history.undo(&self.engine).await {
            Ok(Some(result)) => {
                drop(history);
                if let Some((old, new)) = relocation {
                    self.apply_relocation(&new, &old);
                }
                self.relist_quietly(&result.affected_parents).await;
                self.sync_view();
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                drop(history);
                self.resync_after_failure(&err, &parents).await;
                Err(err)
            }
        }
    }

    pub async fn redo(&self) -> OpsResult<Option<UndoResult>> {
        let _guard = self.gate.try_acquire()?;
        let mut history = self.history.lock().await;
        let relocation = history.peek_redo().and_then(relocation_of);
        let removed = history.peek_redo().map(deleted_paths).unwrap_or_default();
        let parents = history
            .peek_redo()
            .map(OperationRecord::affected_parents)
            .unwrap_or_default();

        match history.redo(&self.engine).await {
            Ok(Some(result)) => {
                drop(history);
                if let Some((old, new)) = relocation {
                    self.apply_relocation(&old, &new);
                }
                for path in &removed {
                    self.apply_removal(path);
                }
                self.relist_quietly(&result.affected_parents).await;
                self.sync_view();
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                drop(history);
                self.resync_after_failure(&err, &parents).await;
                Err(err)
            }
        }
    }

    pub async fn undo_preview(&self) -> Vec<String> {
        self.history.lock().await.undo_preview()
    }

    pub async fn redo_preview(&self) -> Vec<String> {
        self.history.lock().await.redo_preview()
    }

    pub async fn can_undo(&self) -> bool {
        self.history.lock().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.history.lock().await.can_redo()
    }

    fn item(&self, id: ItemId) -> OpsResult<Item> {
        self.cache
            .lock()
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| OpsError::NotFound(id.to_string()))
    }

    fn item_ref(&self, id: ItemId) -> OpsResult<ItemRef> {
        self.cache
            .lock()
            .find_by_id(id)
            .map(ItemRef::from)
            .ok_or_else(|| OpsError::NotFound(id.to_string()))
    }

    fn apply_relocation(&self, from: &VirtualPath, to: &VirtualPath) {
        self.cache.lock().relocate(from, to);
        self.view.lock().navigator.rebase(from, to);
    }

    fn apply_removal(&self, path: &VirtualPath) {
        self.cache.lock().remove(path);
        self.view.lock().navigator.leave(path);
    }

    /// Drop stale selection ids and keep the cursor in range.
    fn sync_view(&self) {
        let visible = self.visible_items();
        let mut view = self.view.lock();
        view.selection.retain_visible(&visible);
        view.cursor.clamp(visible.len());
    }

    /// Re-list the given folders where the cache holds them.
    async fn relist(&self, parents: &[VirtualPath]) -> OpsResult<()> {
        for parent in parents {
            let loaded = self.cache.lock().is_loaded(parent);
            if !loaded {
                continue;
            }
            let entries = self.store().list(&parent.to_key()).await?;
            self.cache.lock().apply_listing(parent, entries);
        }
        Ok(())
    }

    async fn relist_quietly(&self, parents: &[VirtualPath]) {
        if let Err(err) = self.relist(parents).await {
            warn!(error = %err, "re-listing after history replay failed");
        }
    }

    /// A failed mutation may have changed the store anyway; re-read the
    /// folders it touched. Local rejections never reach the store.
    async fn resync_after_failure(&self, err: &OpsError, parents: &[VirtualPath]) {
        if err.is_local() {
            return;
        }
        warn!(error = %err, "operation failed, re-listing affected folders");
        if let Err(relist_err) = self.relist(parents).await {
            warn!(error = %relist_err, "re-listing after failure failed");
        }
        self.sync_view();
    }
}

fn relocation_of(record: &OperationRecord) -> Option<(VirtualPath, VirtualPath)> {
    match record {
        OperationRecord::Rename {
            old_path, new_path, ..
        } => Some((old_path.clone(), new_path.clone())),
        OperationRecord::Move {
            source_path,
            target_path,
            ..
        } => Some((source_path.clone(), target_path.clone())),
        OperationRecord::Delete { .. } => None,
    }
}

fn deleted_paths(record: &OperationRecord) -> Vec<VirtualPath> {
    match record {
        OperationRecord::Delete { items } => items.iter().map(|i| i.path.clone()).collect(),
        _ => Vec::new(),
    }
}
