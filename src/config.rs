use crate::tree::sort::{SortDirection, SortField, SortSpec};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the placeholder object that keeps an empty folder alive.
pub const DEFAULT_FOLDER_MARKER: &str = ".emptyFolderPlaceholder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub folder_marker: String,
    pub default_sort: SortSpec,
    /// Cap on the undo stack; `None` keeps every record for the session.
    pub history_limit: Option<usize>,
    /// Re-download every transferred leaf and compare digests before the
    /// source is deleted.
    pub verify_transfers: bool,
    pub hide_dotfiles: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            folder_marker: DEFAULT_FOLDER_MARKER.to_string(),
            default_sort: SortSpec {
                field: SortField::Name,
                direction: SortDirection::Asc,
            },
            history_limit: None,
            verify_transfers: false,
            hide_dotfiles: false,
        }
    }
}

impl TreeConfig {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let config: TreeConfig =
            serde_json::from_str(raw).context("parsing tree config json")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tree config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("loading {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(reason) = crate::path::name_violation(&self.folder_marker) {
            anyhow::bail!("invalid folder marker {:?}: {}", self.folder_marker, reason);
        }
        if self.history_limit == Some(0) {
            anyhow::bail!("history_limit must be at least 1 when set");
        }
        Ok(())
    }

    /// Whether a listed name should appear in the tree.
    pub fn is_visible_name(&self, name: &str) -> bool {
        name != self.folder_marker && !(self.hide_dotfiles && name.starts_with('.'))
    }
}
