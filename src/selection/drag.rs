use crate::models::{ItemKind, ItemRef};
use crate::ops::relocate::check_move_target;
use crate::path::VirtualPath;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        item: ItemRef,
    },
    HoveringTarget {
        item: ItemRef,
        target: VirtualPath,
    },
    Dropped {
        item: ItemRef,
        target: VirtualPath,
    },
}

/// How a drop resolves. Only `Move` leads to store calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped onto its own parent.
    NoOp,
    Rejected(String),
    Move {
        item: ItemRef,
        destination: VirtualPath,
    },
}

impl DragState {
    pub fn begin(&mut self, item: ItemRef) {
        *self = DragState::Dragging { item };
    }

    pub fn dragged_item(&self) -> Option<&ItemRef> {
        match self {
            DragState::Idle => None,
            DragState::Dragging { item }
            | DragState::HoveringTarget { item, .. }
            | DragState::Dropped { item, .. } => Some(item),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(
            self,
            DragState::Dragging { .. } | DragState::HoveringTarget { .. }
        )
    }

    /// Only folders become hover targets; anything else keeps plain
    /// `Dragging`.
    pub fn hover(&mut self, target: &ItemRef) {
        let Some(item) = self.active_item() else {
            return;
        };
        *self = if target.kind == ItemKind::Folder {
            DragState::HoveringTarget {
                item,
                target: target.path.clone(),
            }
        } else {
            DragState::Dragging { item }
        };
    }

    pub fn leave(&mut self) {
        if let Some(item) = self.active_item() {
            *self = DragState::Dragging { item };
        }
    }

    pub fn cancel(&mut self) {
        *self = DragState::Idle;
    }

    /// Resolve a drop on `target` without touching the store.
    ///
    /// A valid move leaves the state at `Dropped` until [`DragState::reset`];
    /// every other outcome returns straight to `Idle`.
    pub fn drop_on(&mut self, target: &ItemRef) -> DropOutcome {
        let Some(item) = self.active_item() else {
            return DropOutcome::Rejected("nothing is being dragged".to_string());
        };
        let outcome = resolve_drop(&item, target);
        *self = match outcome {
            DropOutcome::Move { .. } => DragState::Dropped {
                item,
                target: target.path.clone(),
            },
            _ => DragState::Idle,
        };
        outcome
    }

    pub fn reset(&mut self) {
        *self = DragState::Idle;
    }

    fn active_item(&self) -> Option<ItemRef> {
        match self {
            DragState::Dragging { item } | DragState::HoveringTarget { item, .. } => {
                Some(item.clone())
            }
            _ => None,
        }
    }
}

fn resolve_drop(item: &ItemRef, target: &ItemRef) -> DropOutcome {
    if target.kind != ItemKind::Folder {
        return DropOutcome::Rejected(format!("{} is not a folder", target.path));
    }
    if item.path.parent() == target.path {
        return DropOutcome::NoOp;
    }
    if let Err(err) = check_move_target(item, &target.path) {
        return DropOutcome::Rejected(err.to_string());
    }
    DropOutcome::Move {
        item: item.clone(),
        destination: target.path.clone(),
    }
}
