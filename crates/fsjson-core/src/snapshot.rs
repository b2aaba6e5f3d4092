//! Snapshot persistence in flat or tree shape.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::SnapshotError;
use crate::node::Node;
use crate::tree::{aggregate, assemble, flatten};

/// A persisted scan: either a flat record list or one nested tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Unordered records without nesting.
    Flat(Vec<Node>),
    /// One root with nested children.
    Tree(Node),
}

impl Snapshot {
    /// Decode snapshot bytes, trying the flat shape before the tree shape.
    ///
    /// An empty array, or an object with neither a name nor children, is
    /// not a snapshot.
    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self, SnapshotError> {
        match serde_json::from_slice::<Vec<Node>>(bytes) {
            Ok(flat) if !flat.is_empty() => return Ok(Self::Flat(flat)),
            _ => {}
        }
        match serde_json::from_slice::<Node>(bytes) {
            Ok(tree) if !tree.name.is_empty() || !tree.children.is_empty() => Ok(Self::Tree(tree)),
            Ok(_) => Err(SnapshotError::Format {
                path: path.to_path_buf(),
                reason: "object has neither a name nor children".to_string(),
            }),
            Err(err) => Err(SnapshotError::Format {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }),
        }
    }

    /// Read and decode a snapshot file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, path)
    }

    /// Write this snapshot atomically.
    pub fn write(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), SnapshotError> {
        match self {
            Self::Flat(records) => write_json_atomic(path.as_ref(), records, pretty),
            Self::Tree(root) => write_json_atomic(path.as_ref(), root, pretty),
        }
    }

    /// Number of records (flat) or nodes (tree).
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(records) => records.len(),
            Self::Tree(root) => root.iter().count(),
        }
    }

    /// Check if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into an aggregated tree, assembling flat records first.
    pub fn into_tree(self) -> Node {
        let mut root = match self {
            Self::Flat(records) => assemble(records),
            Self::Tree(root) => root,
        };
        aggregate(&mut root);
        root
    }

    /// Convert into flat records.
    pub fn into_flat(self) -> Vec<Node> {
        match self {
            Self::Flat(records) => records,
            Self::Tree(root) => flatten(&root),
        }
    }
}

/// Serialize `value` as JSON to `path` via a temporary file in the same
/// directory and an atomic rename.
///
/// On any failure the temporary file is removed and an existing file at
/// `path` is left untouched.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), SnapshotError> {
    let write_err = |source: std::io::Error| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(write_err)?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        let encoded = if pretty {
            serde_json::to_writer_pretty(&mut writer, value)
        } else {
            serde_json::to_writer(&mut writer, value)
        };
        encoded.map_err(|e| write_err(e.into()))?;
        writer.write_all(b"\n").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    tracing::debug!(path = %path.display(), "snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detects_flat_shape() {
        let json = br#"[{"IsDir":true,"FullName":"a","FullPath":"/a"},{"FullName":"b.txt","FullPath":"/a/b.txt","ParentDir":"/a","SizeBytes":3}]"#;
        let snapshot = Snapshot::from_slice(json, Path::new("x.json")).unwrap();
        assert!(matches!(snapshot, Snapshot::Flat(ref v) if v.len() == 2));
        let tree = snapshot.into_tree();
        assert_eq!(tree.size_bytes, 3);
        assert_eq!(tree.child_count, 1);
    }

    #[test]
    fn test_detects_tree_shape() {
        let json = br#"{"IsDir":true,"FullName":"root","Children":[{"FullName":"f","SizeBytes":9}]}"#;
        let snapshot = Snapshot::from_slice(json, Path::new("x.json")).unwrap();
        assert!(matches!(snapshot, Snapshot::Tree(_)));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_rejects_unrecognized_shapes() {
        for bad in [&b"[]"[..], b"{}", b"42", b"not json"] {
            let err = Snapshot::from_slice(bad, Path::new("bad.json")).unwrap_err();
            assert!(matches!(err, SnapshotError::Format { .. }));
        }
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("tree.json");
        let tree = Node::new_directory("root").with_children(vec![Node::new_file("a.md", 12)]);

        Snapshot::Tree(tree.clone()).write(&out, true).unwrap();
        let loaded = Snapshot::read(&out).unwrap();
        assert_eq!(loaded, Snapshot::Tree(tree));

        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("keep.json");
        std::fs::write(&out, "previous").unwrap();

        let missing_dir = temp.path().join("missing").join("out.json");
        let err = write_json_atomic(&missing_dir, &Node::new_file("x", 1), false).unwrap_err();
        assert!(matches!(err, SnapshotError::Write { .. }));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "previous");
    }

    #[test]
    fn test_read_missing_file() {
        let err = Snapshot::read("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SnapshotError::Read { .. }));
    }
}
