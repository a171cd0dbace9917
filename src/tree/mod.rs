//! Client-side mirror of the visible part of the remote tree.
//!
//! The cache holds the listing of the navigated folder plus the children of
//! every folder that has been expanded. It never talks to the store while a
//! caller holds it mutably across an await; listings are fetched first and
//! applied afterwards with [`TreeCache::apply_listing`] and friends.

pub mod sort;


use crate::config::TreeConfig;
use crate::models::{FileCategory, FileItem, FolderItem, Item, ItemId, ItemKind};
use crate::ops::error::{OpsError, OpsResult};
use crate::path::VirtualPath;
use crate::store::{EntryKind, ObjectStore, StoreEntry};
use serde::Serialize;
use sort::{sort_items, sort_recursive, SortSpec};
use std::collections::HashMap;
use tracing::debug;

/// One row of the flattened, rendered order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleItem {
    pub id: ItemId,
    pub name: String,
    pub path: VirtualPath,
    pub kind: ItemKind,
    pub depth: usize,
    pub detail: Option<String>,
}

/// What a toggle needs before it can finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Collapsed,
    Expanded,
    /// Children were never listed; fetch them and call
    /// [`TreeCache::complete_expand`].
    NeedsLoad(VirtualPath),
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    pub root_path: VirtualPath,
    pub sort: SortSpec,
    pub items: Vec<Item>,
}

pub struct TreeCache {
    config: TreeConfig,
    root_path: VirtualPath,
    items: Vec<Item>,
    root_loaded: bool,
    sort: SortSpec,
    ids: HashMap<VirtualPath, ItemId>,
    next_id: u64,
}

impl TreeCache {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            sort: config.default_sort,
            config,
            root_path: VirtualPath::root(),
            items: Vec::new(),
            root_loaded: false,
            ids: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn root_path(&self) -> &VirtualPath {
        &self.root_path
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_root_loaded(&self) -> bool {
        self.root_loaded
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    pub fn set_sort(&mut self, spec: SortSpec) {
        self.sort = spec;
        sort_recursive(&mut self.items, spec);
    }

    pub fn update_config(&mut self, config: TreeConfig) {
        self.config = config;
    }

    /// Fetch and build the sorted children of `path` without touching the
    /// cached tree.
    pub async fn list_children<S>(&mut self, store: &S, path: &VirtualPath) -> OpsResult<Vec<Item>>
    where
        S: ObjectStore + ?Sized,
    {
        let entries = store.list(&path.to_key()).await?;
        Ok(self.build_items(path, entries))
    }

    /// Turn a raw listing into sorted items, reusing ids for known paths.
    /// Folder markers never become items.
    pub fn build_items(&mut self, parent: &VirtualPath, entries: Vec<StoreEntry>) -> Vec<Item> {
        let visible: Vec<StoreEntry> = entries
            .into_iter()
            .filter(|entry| self.config.is_visible_name(&entry.name))
            .collect();
        let mut items: Vec<Item> = visible
            .into_iter()
            .map(|entry| self.item_from_entry(parent, entry))
            .collect();
        sort_items(&mut items, self.sort);
        items
    }

    fn item_from_entry(&mut self, parent: &VirtualPath, entry: StoreEntry) -> Item {
        let path = parent.join(&entry.name);
        let id = self.id_for(&path);
        match entry.kind {
            EntryKind::Folder => Item::Folder(FolderItem {
                id,
                name: entry.name,
                path,
                updated_at: entry.updated_at,
                expanded: false,
                children: None,
            }),
            EntryKind::File => Item::File(FileItem {
                id,
                category: FileCategory::from_name(&entry.name),
                name: entry.name,
                path,
                updated_at: entry.updated_at,
                size: entry.size.unwrap_or(0),
            }),
        }
    }

    fn id_for(&mut self, path: &VirtualPath) -> ItemId {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.ids.insert(path.clone(), id);
        id
    }

    fn forget_under(&mut self, path: &VirtualPath) {
        self.ids.retain(|known, _| !known.starts_with(path));
    }

    /// Replace the top level with a fresh listing of `path`.
    pub fn set_root(&mut self, path: VirtualPath, entries: Vec<StoreEntry>) {
        if path != self.root_path {
            self.root_path = path;
            self.items.clear();
        }
        let root = self.root_path.clone();
        self.merge_level(&root, entries);
        self.root_loaded = true;
    }

    /// Apply a fresh listing of `parent` if that level is cached. Expansion
    /// state and loaded children of surviving folders are kept. Returns
    /// whether anything was updated.
    pub fn apply_listing(&mut self, parent: &VirtualPath, entries: Vec<StoreEntry>) -> bool {
        if !self.is_loaded(parent) {
            return false;
        }
        self.merge_level(parent, entries);
        true
    }

    fn merge_level(&mut self, parent: &VirtualPath, entries: Vec<StoreEntry>) {
        let mut fresh = self.build_items(parent, entries);
        let Some(level) = self.level_mut(parent) else {
            return;
        };
        let mut previous: HashMap<VirtualPath, Item> = level
            .drain(..)
            .map(|item| (item.path().clone(), item))
            .collect();

        for item in fresh.iter_mut() {
            let key = item.path().clone();
            if let (Item::Folder(folder), Some(Item::Folder(old))) = (item, previous.remove(&key)) {
                folder.expanded = old.expanded;
                folder.children = old.children;
            }
        }

        if let Some(level) = self.level_mut(parent) {
            *level = fresh;
        }
        for gone in previous.keys() {
            self.forget_under(gone);
        }
        debug!(path = %parent, "tree level refreshed");
    }

    /// Flip a folder's expansion. Expanding a never-listed folder leaves the
    /// flag alone and asks the caller to load it first.
    pub fn begin_toggle(&mut self, id: ItemId) -> OpsResult<ToggleOutcome> {
        let item = self
            .find_mut_by_id(id)
            .ok_or_else(|| OpsError::NotFound(id.to_string()))?;
        let folder = match item {
            Item::Folder(folder) => folder,
            Item::File(file) => {
                return Err(OpsError::InvalidTarget(format!(
                    "{} is not a folder",
                    file.path
                )))
            }
        };

        if folder.expanded {
            folder.expanded = false;
            Ok(ToggleOutcome::Collapsed)
        } else if folder.children.is_some() {
            folder.expanded = true;
            Ok(ToggleOutcome::Expanded)
        } else {
            Ok(ToggleOutcome::NeedsLoad(folder.path.clone()))
        }
    }

    /// Store loaded children and mark the folder expanded.
    pub fn complete_expand(&mut self, path: &VirtualPath, entries: Vec<StoreEntry>) -> bool {
        let children = self.build_items(path, entries);
        match self.find_mut_by_path(path) {
            Some(Item::Folder(folder)) => {
                folder.children = Some(children);
                folder.expanded = true;
                true
            }
            _ => false,
        }
    }

    /// Standalone toggle for callers that own the cache outright.
    pub async fn toggle_expand<S>(&mut self, store: &S, id: ItemId) -> OpsResult<ToggleOutcome>
    where
        S: ObjectStore + ?Sized,
    {
        match self.begin_toggle(id)? {
            ToggleOutcome::NeedsLoad(path) => {
                let entries = store.list(&path.to_key()).await?;
                self.complete_expand(&path, entries);
                Ok(ToggleOutcome::Expanded)
            }
            outcome => Ok(outcome),
        }
    }

    /// Re-list one cached folder. Returns false if `path` is not loaded, in
    /// which case the store is not called.
    pub async fn refresh<S>(&mut self, store: &S, path: &VirtualPath) -> OpsResult<bool>
    where
        S: ObjectStore + ?Sized,
    {
        if !self.is_loaded(path) {
            return Ok(false);
        }
        let entries = store.list(&path.to_key()).await?;
        Ok(self.apply_listing(path, entries))
    }

    /// Whether the children of `path` are held in the cache.
    pub fn is_loaded(&self, path: &VirtualPath) -> bool {
        if *path == self.root_path {
            return self.root_loaded;
        }
        matches!(
            self.find_by_path(path),
            Some(Item::Folder(FolderItem {
                children: Some(_),
                ..
            }))
        )
    }

    fn level_mut(&mut self, path: &VirtualPath) -> Option<&mut Vec<Item>> {
        if *path == self.root_path {
            return Some(&mut self.items);
        }
        match self.find_mut_by_path(path) {
            Some(Item::Folder(folder)) => folder.children.as_mut(),
            _ => None,
        }
    }

    pub fn find_by_id(&self, id: ItemId) -> Option<&Item> {
        fn walk(items: &[Item], id: ItemId) -> Option<&Item> {
            for item in items {
                if item.id() == id {
                    return Some(item);
                }
                if let Item::Folder(FolderItem {
                    children: Some(children),
                    ..
                }) = item
                {
                    if let Some(found) = walk(children, id) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(&self.items, id)
    }

    fn find_mut_by_id(&mut self, id: ItemId) -> Option<&mut Item> {
        fn walk(items: &mut [Item], id: ItemId) -> Option<&mut Item> {
            for item in items {
                if item.id() == id {
                    return Some(item);
                }
                if let Item::Folder(FolderItem {
                    children: Some(children),
                    ..
                }) = item
                {
                    if let Some(found) = walk(children, id) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(&mut self.items, id)
    }

    pub fn find_by_path(&self, path: &VirtualPath) -> Option<&Item> {
        let relative = path.rebase(&self.root_path, &VirtualPath::root())?;
        let (last, ancestors) = relative.segments().split_last()?;
        let mut level = &self.items;
        for segment in ancestors {
            let item = level.iter().find(|item| item.name() == segment)?;
            level = item.as_folder()?.children.as_ref()?;
        }
        level.iter().find(|item| item.name() == last)
    }

    fn find_mut_by_path(&mut self, path: &VirtualPath) -> Option<&mut Item> {
        let relative = path.rebase(&self.root_path, &VirtualPath::root())?;
        let (last, ancestors) = relative.segments().split_last()?;
        let mut level = &mut self.items;
        for segment in ancestors {
            let item = level.iter_mut().find(|item| item.name() == segment)?;
            level = item.as_folder_mut()?.children.as_mut()?;
        }
        level.iter_mut().find(|item| item.name() == last)
    }

    /// Insert a freshly created entry under `parent` if that level is cached.
    pub fn insert(&mut self, parent: &VirtualPath, entry: StoreEntry) -> Option<ItemId> {
        if !self.is_loaded(parent) || !self.config.is_visible_name(&entry.name) {
            return None;
        }
        let item = self.item_from_entry(parent, entry);
        let id = item.id();
        let sort = self.sort;
        let level = self.level_mut(parent)?;
        level.retain(|existing| existing.path() != item.path());
        level.push(item);
        sort_items(level, sort);
        Some(id)
    }

    /// Drop a cached item and everything beneath it.
    pub fn remove(&mut self, path: &VirtualPath) -> Option<Item> {
        if self.root_path.starts_with(path) && !path.is_root() {
            // The navigated folder itself is gone; fall back to its parent.
            self.root_path = path.parent();
            self.items.clear();
            self.root_loaded = false;
            self.forget_under(path);
            return None;
        }
        let level = self.level_mut(&path.parent())?;
        let index = level.iter().position(|item| item.path() == path)?;
        let removed = level.remove(index);
        self.forget_under(path);
        Some(removed)
    }

    /// Move a cached item (and every cached descendant) from `old` to `new`,
    /// carrying ids along. If the destination level is not cached the item
    /// simply leaves the view.
    pub fn relocate(&mut self, old: &VirtualPath, new: &VirtualPath) {
        let rebased: Vec<(VirtualPath, ItemId)> = self
            .ids
            .iter()
            .filter_map(|(path, id)| path.rebase(old, new).map(|p| (p, *id)))
            .collect();
        self.forget_under(old);
        self.ids.extend(rebased);

        if self.root_path.starts_with(old) {
            if let Some(root) = self.root_path.rebase(old, new) {
                self.root_path = root;
            }
            for item in self.items.iter_mut() {
                item.rebase(old, new);
            }
            return;
        }

        let Some(mut item) = self
            .level_mut(&old.parent())
            .and_then(|level| {
                let index = level.iter().position(|item| item.path() == old)?;
                Some(level.remove(index))
            })
        else {
            return;
        };

        item.rebase(old, new);
        let sort = self.sort;
        if let Some(level) = self.level_mut(&new.parent()) {
            level.retain(|existing| existing.path() != new);
            level.push(item);
            sort_items(level, sort);
        }
    }

    /// The rendered order: top level, then each expanded folder's children
    /// directly after it, depth first.
    pub fn flatten_visible(&self) -> Vec<VisibleItem> {
        fn walk(items: &[Item], depth: usize, out: &mut Vec<VisibleItem>) {
            for item in items {
                out.push(VisibleItem {
                    id: item.id(),
                    name: item.name().to_string(),
                    path: item.path().clone(),
                    kind: item.kind(),
                    depth,
                    detail: item.detail(),
                });
                if let Item::Folder(FolderItem {
                    expanded: true,
                    children: Some(children),
                    ..
                }) = item
                {
                    walk(children, depth + 1, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.items, 0, &mut out);
        out
    }

    /// Every folder level currently held, root first.
    pub fn loaded_levels(&self) -> Vec<VirtualPath> {
        fn walk(items: &[Item], out: &mut Vec<VirtualPath>) {
            for item in items {
                if let Item::Folder(FolderItem {
                    path,
                    children: Some(children),
                    ..
                }) = item
                {
                    out.push(path.clone());
                    walk(children, out);
                }
            }
        }
        let mut out = Vec::new();
        if self.root_loaded {
            out.push(self.root_path.clone());
        }
        walk(&self.items, &mut out);
        out
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            root_path: self.root_path.clone(),
            sort: self.sort,
            items: self.items.clone(),
        }
    }
}
