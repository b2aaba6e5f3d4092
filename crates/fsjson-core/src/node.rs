//! Snapshot node type.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::format::human_size;

/// Name given to the directory that wraps several root candidates.
pub const SYNTHETIC_ROOT_NAME: &str = "(root)";

/// Name given to the directory returned when there is nothing to assemble.
pub const EMPTY_ROOT_NAME: &str = "(empty)";

/// A single file system entry, or a synthetic container.
///
/// Field names on the wire use the established PascalCase snapshot keys
/// (`FullName`, `Md5`, `FileType`, ...) so existing snapshot files keep
/// loading. Missing fields default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Node {
    /// Whether this entry is a directory.
    pub is_dir: bool,

    /// File/directory name (not full path).
    #[serde(rename = "FullName")]
    pub name: CompactString,

    /// Lowercased extension without the leading dot.
    pub ext: CompactString,

    /// Name without its extension.
    pub name_only: CompactString,

    /// Size in bytes (aggregate for directories).
    pub size_bytes: u64,

    /// Display form of `size_bytes`. Derived, never authoritative.
    pub size_human: String,

    /// Canonical path, used as the assembly key.
    pub full_path: String,

    /// Path as originally scanned, used as the cross-snapshot dedup key.
    pub full_path_orig: String,

    /// Path of the containing directory; empty at top level.
    pub parent_dir: String,

    /// Creation time, `None` when unknown.
    #[serde(
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,

    /// Last modification time, `None` when unknown.
    #[serde(
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,

    /// Unix-style permission string, e.g. `drwxr-xr-x`.
    pub perm: CompactString,

    /// Content hash for files, name-derived placeholder for directories.
    #[serde(rename = "Md5")]
    pub content_hash: String,

    /// Category derived from the extension.
    #[serde(rename = "FileType")]
    pub category: Category,

    /// Number of direct children.
    pub child_count: usize,

    /// Children in canonical order (directories only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a file node with the given name and size.
    pub fn new_file(name: impl Into<CompactString>, size: u64) -> Self {
        let name = name.into();
        let (name_only, ext) = split_extension(&name);
        Self {
            category: Category::from_extension(&ext),
            name_only,
            ext,
            size_bytes: size,
            size_human: human_size(size),
            full_path: name.to_string(),
            full_path_orig: name.to_string(),
            name,
            ..Self::default()
        }
    }

    /// Create an empty directory node with the given name.
    pub fn new_directory(name: impl Into<CompactString>) -> Self {
        let name = name.into();
        Self {
            is_dir: true,
            name_only: name.clone(),
            full_path: name.to_string(),
            full_path_orig: name.to_string(),
            size_human: human_size(0),
            name,
            ..Self::default()
        }
    }

    /// Directory node returned when there is nothing to assemble or merge.
    pub fn empty_root() -> Self {
        let mut node = Self::new_directory(EMPTY_ROOT_NAME);
        node.full_path.clear();
        node.full_path_orig.clear();
        node
    }

    /// Synthetic directory wrapping several roots.
    pub fn synthetic_root(children: Vec<Node>) -> Self {
        let mut node = Self::new_directory(SYNTHETIC_ROOT_NAME);
        node.full_path.clear();
        node.full_path_orig.clear();
        node.children = children;
        node.refresh_directory();
        node
    }

    /// Builder-style helper setting both path fields.
    pub fn with_path(mut self, full_path: impl Into<String>, parent_dir: impl Into<String>) -> Self {
        self.full_path = full_path.into();
        self.full_path_orig = self.full_path.clone();
        self.parent_dir = parent_dir.into();
        self
    }

    /// Builder-style helper attaching children and refreshing aggregates.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self.refresh_directory();
        self
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Whether this node was introduced by assembly rather than scanned.
    pub fn is_synthetic(&self) -> bool {
        self.is_dir
            && self.full_path.is_empty()
            && (self.name == SYNTHETIC_ROOT_NAME || self.name == EMPTY_ROOT_NAME)
    }

    /// Number of files in this subtree (1 for a file).
    pub fn count_files(&self) -> usize {
        if !self.is_dir {
            return 1;
        }
        self.children.iter().map(Node::count_files).sum()
    }

    /// Number of directories in this subtree, including this one.
    pub fn count_dirs(&self) -> usize {
        if !self.is_dir {
            return 0;
        }
        1 + self.children.iter().map(Node::count_dirs).sum::<usize>()
    }

    /// Sum of the direct children's sizes.
    pub fn children_size(&self) -> u64 {
        self.children
            .iter()
            .fold(0u64, |total, child| total.saturating_add(child.size_bytes))
    }

    /// Sort direct children into canonical order.
    pub fn sort_children(&mut self) {
        self.children.sort_by(canonical_order);
    }

    /// Recompute size, display size and child count from the direct
    /// children, then sort them. Does not descend.
    pub fn refresh_directory(&mut self) {
        self.size_bytes = self.children_size();
        self.size_human = human_size(self.size_bytes);
        self.child_count = self.children.len();
        self.sort_children();
    }

    /// Iterate this node and all descendants in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// Canonical sibling order: directories first, then case-insensitive name.
pub fn canonical_order(a: &Node, b: &Node) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

/// Split a file name into `(name_only, lowercased extension)`.
///
/// Dot-files such as `.bashrc` have no extension.
pub fn split_extension(name: &str) -> (CompactString, CompactString) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (
            CompactString::new(&name[..idx]),
            CompactString::new(name[idx + 1..].to_lowercase()),
        ),
        _ => (CompactString::new(name), CompactString::default()),
    }
}

/// Timestamp decoding that treats the zero time written by Go encoders
/// (`0001-01-01T00:00:00Z`) as unset.
mod timestamp {
    use chrono::{DateTime, Datelike, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(value.filter(|t| t.year() > 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node_creation() {
        let node = Node::new_file("photo.JPG", 2048);
        assert!(node.is_file());
        assert_eq!(node.ext, "jpg");
        assert_eq!(node.name_only, "photo");
        assert_eq!(node.category, Category::Image);
        assert_eq!(node.size_human, "2.00 KB");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("archive.tar.gz").1, "gz");
        assert_eq!(split_extension(".bashrc").1, "");
        assert_eq!(split_extension("README").0, "README");
        assert_eq!(split_extension("trailing.").1, "");
    }

    #[test]
    fn test_canonical_order() {
        let mut dir = Node::new_directory("root").with_children(vec![
            Node::new_file("b.txt", 1),
            Node::new_directory("Zeta"),
            Node::new_file("A.txt", 1),
            Node::new_directory("alpha"),
        ]);
        dir.sort_children();
        let names: Vec<_> = dir.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["alpha", "Zeta", "A.txt", "b.txt"]);
    }

    #[test]
    fn test_counts_and_iter() {
        let tree = Node::new_directory("root").with_children(vec![
            Node::new_directory("sub").with_children(vec![Node::new_file("x", 3)]),
            Node::new_file("y", 4),
        ]);
        assert_eq!(tree.count_files(), 2);
        assert_eq!(tree.count_dirs(), 2);
        assert_eq!(tree.size_bytes, 7);
        let order: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, ["root", "sub", "x", "y"]);
    }

    #[test]
    fn test_go_zero_time_is_unset() {
        let json = r#"{"FullName":"a","Created":"0001-01-01T00:00:00Z","Updated":"2024-05-01T10:00:00+02:00"}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(node.created.is_none());
        assert_eq!(node.updated.unwrap().to_rfc3339(), "2024-05-01T08:00:00+00:00");
    }
}
