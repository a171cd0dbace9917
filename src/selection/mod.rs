pub mod drag;
pub mod navigation;

#[cfg(test)]
mod tests;

use crate::models::ItemId;
use crate::tree::VisibleItem;
use serde::Serialize;
use std::collections::BTreeSet;

pub use drag::{DragState, DropOutcome};
pub use navigation::{Breadcrumb, NavError, Navigator};

/// Multi-select state. Toggling an item switches the mode on; only
/// [`SelectionSet::exit`] switches it off again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    active: bool,
    ids: BTreeSet<ItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip membership of `id`. Returns whether it is now selected.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        self.active = true;
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn select_all(&mut self, visible: &[VisibleItem]) {
        self.active = true;
        self.ids.extend(visible.iter().map(|row| row.id));
    }

    /// Empty the set but stay in multi-select mode.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn exit(&mut self) {
        self.ids.clear();
        self.active = false;
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget ids that are no longer rendered, e.g. after a refresh or delete.
    pub fn retain_visible(&mut self, visible: &[VisibleItem]) {
        self.ids
            .retain(|id| visible.iter().any(|row| row.id == *id));
    }
}

/// Keyboard focus over the flattened visible order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    index: Option<usize>,
}

impl Cursor {
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current<'a>(&self, visible: &'a [VisibleItem]) -> Option<&'a VisibleItem> {
        self.index.and_then(|i| visible.get(i))
    }

    pub fn set(&mut self, index: usize, len: usize) {
        self.index = (len > 0).then(|| index.min(len - 1));
    }

    pub fn next(&mut self, len: usize) {
        match self.index {
            Some(i) => self.set(i + 1, len),
            None => self.first(len),
        }
    }

    pub fn prev(&mut self, len: usize) {
        match self.index {
            Some(i) => self.set(i.saturating_sub(1), len),
            None => self.last(len),
        }
    }

    pub fn first(&mut self, len: usize) {
        self.set(0, len);
    }

    pub fn last(&mut self, len: usize) {
        self.set(len.saturating_sub(1), len);
    }

    /// Keep the focus inside a list that may have shrunk.
    pub fn clamp(&mut self, len: usize) {
        if let Some(i) = self.index {
            self.set(i, len);
        }
    }
}
