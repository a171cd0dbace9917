use crate::models::Item;
use crate::ops::error::OpsError;
use crate::path::VirtualPath;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("{0} is not a folder")]
    NotAFolder(VirtualPath),
    #[error("{0} is not on the current path")]
    NotOnPath(VirtualPath),
}

impl From<NavError> for OpsError {
    fn from(err: NavError) -> Self {
        OpsError::InvalidTarget(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: VirtualPath,
}

pub const ROOT_LABEL: &str = "Home";

/// The folder the user is looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigator {
    current: VirtualPath,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(path: VirtualPath) -> Self {
        Self { current: path }
    }

    pub fn current_path(&self) -> &VirtualPath {
        &self.current
    }

    pub fn navigate_into(&mut self, item: &Item) -> Result<&VirtualPath, NavError> {
        match item {
            Item::Folder(folder) => {
                self.current = folder.path.clone();
                Ok(&self.current)
            }
            Item::File(file) => Err(NavError::NotAFolder(file.path.clone())),
        }
    }

    /// Returns false at the root, where there is nowhere to go.
    pub fn navigate_up(&mut self) -> bool {
        if self.current.is_root() {
            return false;
        }
        self.current = self.current.parent();
        true
    }

    pub fn navigate_to_breadcrumb(&mut self, path: &VirtualPath) -> Result<&VirtualPath, NavError> {
        if !self.current.starts_with(path) {
            return Err(NavError::NotOnPath(path.clone()));
        }
        self.current = path.clone();
        Ok(&self.current)
    }

    /// Root first, current folder last.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.current
            .ancestors()
            .into_iter()
            .map(|path| Breadcrumb {
                name: path.name().unwrap_or(ROOT_LABEL).to_string(),
                path,
            })
            .collect()
    }

    /// Follow the current folder when it is renamed or moved.
    pub(crate) fn rebase(&mut self, old: &VirtualPath, new: &VirtualPath) {
        if let Some(path) = self.current.rebase(old, new) {
            self.current = path;
        }
    }

    /// Step out of a folder that no longer exists.
    pub(crate) fn leave(&mut self, removed: &VirtualPath) {
        if self.current.starts_with(removed) && !removed.is_root() {
            self.current = removed.parent();
        }
    }
}
