use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEPARATOR: char = '/';

/// A location in the virtual tree, kept as a list of name segments.
///
/// Segments are only joined into a `/`-separated key at the store boundary
/// (see [`VirtualPath::to_key`]). The root is the empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a store key. Empty segments are dropped, so `""`, `"/"` and
    /// `"a//b/"` all normalize.
    pub fn parse(key: &str) -> Self {
        Self {
            segments: key
                .split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Leaf segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path. The root is its own parent.
    pub fn parent(&self) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn join(&self, name: &str) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn with_name(&self, name: &str) -> VirtualPath {
        self.parent().join(name)
    }

    /// True when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub fn is_strict_descendant_of(&self, ancestor: &VirtualPath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    /// Swap `old_prefix` for `new_prefix`. Returns `None` if this path is not
    /// under `old_prefix`.
    pub fn rebase(&self, old_prefix: &VirtualPath, new_prefix: &VirtualPath) -> Option<VirtualPath> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut segments = new_prefix.segments.clone();
        segments.extend_from_slice(&self.segments[old_prefix.segments.len()..]);
        Some(Self { segments })
    }

    /// Every ancestor from the root down to and including this path.
    pub fn ancestors(&self) -> Vec<VirtualPath> {
        (0..=self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// The `/`-joined key the object store understands.
    pub fn to_key(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.to_key())
        }
    }
}

impl From<&str> for VirtualPath {
    fn from(key: &str) -> Self {
        Self::parse(key)
    }
}

/// Why a proposed item name cannot be used.
pub fn name_violation(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("name is empty")
    } else if name.contains(SEPARATOR) || name.contains('\\') {
        Some("name contains a path separator")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_separators() {
        assert_eq!(VirtualPath::parse(""), VirtualPath::root());
        assert_eq!(VirtualPath::parse("/"), VirtualPath::root());
        assert_eq!(
            VirtualPath::parse("a//b/"),
            VirtualPath::from_segments(["a", "b"])
        );
        assert_eq!(VirtualPath::parse("a/b").to_key(), "a/b");
    }

    #[test]
    fn test_parent_and_name() {
        let path = VirtualPath::parse("Scores/2024/a.pdf");
        assert_eq!(path.name(), Some("a.pdf"));
        assert_eq!(path.parent().to_key(), "Scores/2024");
        assert_eq!(VirtualPath::root().parent(), VirtualPath::root());
        assert_eq!(path.with_name("b.pdf").to_key(), "Scores/2024/b.pdf");
    }

    #[test]
    fn test_rebase() {
        let path = VirtualPath::parse("Scores/2024/a.pdf");
        let rebased = path
            .rebase(&"Scores".into(), &"Archive/Scores".into())
            .unwrap();
        assert_eq!(rebased.to_key(), "Archive/Scores/2024/a.pdf");
        assert!(path.rebase(&"Other".into(), &"X".into()).is_none());
        // Segment-wise, not string-prefix
        assert!(!VirtualPath::parse("Scores2/a").starts_with(&"Scores".into()));
    }

    #[test]
    fn test_descendant_checks() {
        let folder = VirtualPath::parse("a/b");
        assert!(VirtualPath::parse("a/b/c").is_strict_descendant_of(&folder));
        assert!(!folder.is_strict_descendant_of(&folder));
        assert!(folder.starts_with(&folder));
        assert_eq!(folder.ancestors().len(), 3);
    }

    #[test]
    fn test_name_violation() {
        assert!(name_violation("").is_some());
        assert!(name_violation("   ").is_some());
        assert!(name_violation("a/b").is_some());
        assert!(name_violation("..").is_some());
        assert!(name_violation("song-final.mp3").is_none());
    }
}
