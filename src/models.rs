use crate::path::VirtualPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session-stable identifier for a cached item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::File => write!(f, "file"),
            ItemKind::Folder => write!(f, "folder"),
        }
    }
}

/// Display hint derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileCategory {
    Audio,
    Video,
    Image,
    Document,
    Score,
    Archive,
    Text,
    Other,
}

impl FileCategory {
    pub fn from_name(name: &str) -> Self {
        let extension = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => return FileCategory::Other,
        };

        match extension.as_str() {
            "mp3" | "wav" | "ogg" | "flac" | "m4a" | "aac" => FileCategory::Audio,
            "mp4" | "webm" | "mov" | "avi" | "mkv" => FileCategory::Video,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" => FileCategory::Image,
            "pdf" | "doc" | "docx" | "odt" | "rtf" => FileCategory::Document,
            "mid" | "midi" | "musicxml" | "mxl" | "mscz" | "sib" => FileCategory::Score,
            "zip" | "tar" | "gz" | "7z" | "rar" => FileCategory::Archive,
            "txt" | "md" | "csv" | "json" | "toml" => FileCategory::Text,
            _ => FileCategory::Other,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FileCategory::Audio => "Audio",
            FileCategory::Video => "Video",
            FileCategory::Image => "Image",
            FileCategory::Document => "Document",
            FileCategory::Score => "Score",
            FileCategory::Archive => "Archive",
            FileCategory::Text => "Text",
            FileCategory::Other => "File",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub id: ItemId,
    pub name: String,
    pub path: VirtualPath,
    pub updated_at: Option<DateTime<Utc>>,
    pub size: u64,
    pub category: FileCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderItem {
    pub id: ItemId,
    pub name: String,
    pub path: VirtualPath,
    pub updated_at: Option<DateTime<Utc>>,
    pub expanded: bool,
    /// `None` until the folder has been listed.
    pub children: Option<Vec<Item>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    File(FileItem),
    Folder(FolderItem),
}

impl Item {
    pub fn id(&self) -> ItemId {
        match self {
            Item::File(file) => file.id,
            Item::Folder(folder) => folder.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Item::File(file) => &file.name,
            Item::Folder(folder) => &folder.name,
        }
    }

    pub fn path(&self) -> &VirtualPath {
        match self {
            Item::File(file) => &file.path,
            Item::Folder(folder) => &folder.path,
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Item::File(file) => file.updated_at,
            Item::Folder(folder) => folder.updated_at,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::File(_) => ItemKind::File,
            Item::Folder(_) => ItemKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Item::Folder(_))
    }

    /// Secondary row text: category and size for files, nothing for folders.
    pub fn detail(&self) -> Option<String> {
        match self {
            Item::File(file) => Some(format!(
                "{}, {}",
                file.category.display_name(),
                format_bytes(file.size)
            )),
            Item::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderItem> {
        match self {
            Item::Folder(folder) => Some(folder),
            Item::File(_) => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut FolderItem> {
        match self {
            Item::Folder(folder) => Some(folder),
            Item::File(_) => None,
        }
    }

    /// Rewrite this item's path and the paths of every loaded descendant.
    pub(crate) fn rebase(&mut self, old_prefix: &VirtualPath, new_prefix: &VirtualPath) {
        match self {
            Item::File(file) => {
                if let Some(path) = file.path.rebase(old_prefix, new_prefix) {
                    file.path = path;
                }
                if let Some(name) = file.path.name() {
                    file.name = name.to_string();
                    file.category = FileCategory::from_name(name);
                }
            }
            Item::Folder(folder) => {
                if let Some(path) = folder.path.rebase(old_prefix, new_prefix) {
                    folder.path = path;
                }
                if let Some(name) = folder.path.name() {
                    folder.name = name.to_string();
                }
                if let Some(children) = folder.children.as_mut() {
                    for child in children {
                        child.rebase(old_prefix, new_prefix);
                    }
                }
            }
        }
    }
}

/// Path and kind of an item, detached from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub path: VirtualPath,
    pub kind: ItemKind,
}

impl ItemRef {
    pub fn file(path: impl Into<VirtualPath>) -> Self {
        Self {
            path: path.into(),
            kind: ItemKind::File,
        }
    }

    pub fn folder(path: impl Into<VirtualPath>) -> Self {
        Self {
            path: path.into(),
            kind: ItemKind::Folder,
        }
    }
}

impl From<&Item> for ItemRef {
    fn from(item: &Item) -> Self {
        Self {
            path: item.path().clone(),
            kind: item.kind(),
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_extension() {
        assert_eq!(FileCategory::from_name("song.MP3"), FileCategory::Audio);
        assert_eq!(FileCategory::from_name("a.pdf"), FileCategory::Document);
        assert_eq!(FileCategory::from_name(".hidden"), FileCategory::Other);
        assert_eq!(FileCategory::from_name("README"), FileCategory::Other);
    }

    #[test]
    fn test_bytes_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_file_detail_shows_category_and_size() {
        let file = Item::File(FileItem {
            id: ItemId(1),
            name: "song.mp3".to_string(),
            path: "song.mp3".into(),
            updated_at: None,
            size: 2048,
            category: FileCategory::from_name("song.mp3"),
        });
        assert_eq!(file.detail().as_deref(), Some("Audio, 2.0 KB"));

        let folder = Item::Folder(FolderItem {
            id: ItemId(2),
            name: "Scores".to_string(),
            path: "Scores".into(),
            updated_at: None,
            expanded: false,
            children: None,
        });
        assert_eq!(folder.detail(), None);
    }

    #[test]
    fn test_rebase_rewrites_descendants() {
        let mut folder = Item::Folder(FolderItem {
            id: ItemId(1),
            name: "Scores".to_string(),
            path: "Scores".into(),
            updated_at: None,
            expanded: true,
            children: Some(vec![Item::File(FileItem {
                id: ItemId(2),
                name: "a.pdf".to_string(),
                path: "Scores/a.pdf".into(),
                updated_at: None,
                size: 1,
                category: FileCategory::Document,
            })]),
        });

        folder.rebase(&"Scores".into(), &"Archive/Sheets".into());
        assert_eq!(folder.name(), "Sheets");
        assert_eq!(folder.path().to_key(), "Archive/Sheets");
        let child = &folder.as_folder().unwrap().children.as_ref().unwrap()[0];
        assert_eq!(child.path().to_key(), "Archive/Sheets/a.pdf");
        assert_eq!(child.name(), "a.pdf");
    }
}
