//! Merging several snapshots into one tree.
//!
//! Directories are merged by name, level by level. With deduplication
//! enabled, a file whose name already exists in the same directory is
//! dropped; deduplication never looks at content and never spans levels.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use compact_str::CompactString;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use fsjson_core::{
    Category, Node, Snapshot, SnapshotError, Warning, aggregate, flatten, write_json_atomic,
};

/// A non-fatal problem with one merge input.
pub type MergeWarning = Warning;

/// Merge `incoming` into `base`, returning the merged directory.
///
/// Same-named subdirectories merge recursively. Same-named files are both
/// kept unless `dedupe` is set, in which case the first one wins. A
/// directory and a file sharing a name are both kept. The result has its
/// direct aggregates refreshed and its children re-sorted.
pub fn merge_directories(mut base: Node, incoming: Node, dedupe: bool) -> Node {
    let mut index: HashMap<CompactString, usize> = HashMap::with_capacity(base.children.len());
    for (i, child) in base.children.iter().enumerate() {
        index.entry(child.name.clone()).or_insert(i);
    }

    for child in incoming.children {
        match index.get(&child.name).copied() {
            Some(i) if base.children[i].is_dir && child.is_dir => {
                let existing = std::mem::take(&mut base.children[i]);
                base.children[i] = merge_directories(existing, child, dedupe);
            }
            Some(i) if !base.children[i].is_dir && !child.is_dir && dedupe => {}
            Some(_) => base.children.push(child),
            None => {
                index.insert(child.name.clone(), base.children.len());
                base.children.push(child);
            }
        }
    }

    if dedupe {
        let mut seen: HashSet<CompactString> = HashSet::new();
        base.children
            .retain(|child| child.is_dir || seen.insert(child.name.clone()));
    }

    base.refresh_directory();
    base
}

/// Merge any number of roots, folding left to right.
///
/// No roots gives the empty sentinel and a single root is returned
/// untouched. Otherwise the result is a directory named after the inputs
/// joined with `+` and categorized as [`Category::Merged`].
pub fn merge_roots(roots: Vec<Node>, dedupe: bool) -> Node {
    let mut roots = roots.into_iter();
    let Some(first) = roots.next() else {
        return Node::empty_root();
    };

    let mut names: Vec<String> = Vec::new();
    if !first.name.is_empty() {
        names.push(first.name.to_string());
    }

    let mut merged = first;
    let mut count = 1;
    for root in roots {
        if !root.name.is_empty() {
            names.push(root.name.to_string());
        }
        merged = merge_directories(merged, root, dedupe);
        count += 1;
    }
    if count == 1 {
        return merged;
    }

    let name = CompactString::new(names.join("+"));
    merged.is_dir = true;
    merged.ext = CompactString::default();
    merged.category = Category::Merged;
    merged.full_path = name.to_string();
    merged.parent_dir.clear();
    merged.name_only = name.clone();
    merged.name = name;
    merged.refresh_directory();
    merged
}

/// Shape of a written snapshot.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputShape {
    /// One nested tree.
    #[default]
    Tree,
    /// A flat record list.
    Flat,
}

/// Options for a merge session.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into), default)]
pub struct MergeOptions {
    /// Drop same-named files within a directory, and repeated original
    /// paths in the flat list.
    pub dedupe: bool,

    /// Shape written by [`Merger::merge_to_file`].
    pub shape: OutputShape,

    /// Indent the written JSON.
    pub pretty: bool,
}

impl MergeOptions {
    /// Create a new options builder.
    pub fn builder() -> MergeOptionsBuilder {
        MergeOptionsBuilder::default()
    }
}

/// Errors that abort a merge session.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Every input was unreadable or unrecognized.
    #[error("No usable snapshot among {attempted} input(s)")]
    NoUsableInputs { attempted: usize },

    /// The merged snapshot could not be written.
    #[error(transparent)]
    Write(#[from] SnapshotError),
}

/// Result of a merge session.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Merged and aggregated tree.
    pub tree: Node,
    /// Concatenated records of every input.
    pub flat: Vec<Node>,
    /// Number of inputs that were merged.
    pub merged_inputs: usize,
    /// Inputs that were skipped.
    pub warnings: Vec<MergeWarning>,
}

impl MergeOutcome {
    /// Package the outcome in the requested shape.
    pub fn into_snapshot(self, shape: OutputShape) -> Snapshot {
        match shape {
            OutputShape::Tree => Snapshot::Tree(self.tree),
            OutputShape::Flat => Snapshot::Flat(self.flat),
        }
    }
}

/// Drives a merge over snapshot files.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    options: MergeOptions,
}

impl Merger {
    /// Create a merger with the given options.
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge already decoded snapshots in order.
    pub fn merge_snapshots(&self, snapshots: Vec<Snapshot>) -> MergeOutcome {
        let merged_inputs = snapshots.len();
        let mut roots = Vec::with_capacity(merged_inputs);
        let mut flat = Vec::new();

        for snapshot in snapshots {
            match &snapshot {
                Snapshot::Flat(records) => flat.extend(records.iter().cloned()),
                Snapshot::Tree(root) => flat.extend(flatten(root)),
            }
            roots.push(snapshot.into_tree());
        }

        if self.options.dedupe {
            let before = flat.len();
            let mut seen: HashSet<String> = HashSet::with_capacity(before);
            flat.retain(|node| seen.insert(node.full_path_orig.clone()));
            tracing::debug!(removed = before - flat.len(), "deduplicated flat records");
        }

        let mut tree = merge_roots(roots, self.options.dedupe);
        aggregate(&mut tree);

        MergeOutcome {
            tree,
            flat,
            merged_inputs,
            warnings: Vec::new(),
        }
    }

    /// Read and merge snapshot files. Unusable inputs are skipped with a
    /// warning.
    pub fn merge_files<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<MergeOutcome, MergeError> {
        let mut snapshots = Vec::with_capacity(inputs.len());
        let mut warnings = Vec::new();

        for input in inputs {
            let path = input.as_ref();
            match Snapshot::read(path) {
                Ok(snapshot) => {
                    tracing::debug!(path = %path.display(), records = snapshot.len(), "loaded snapshot");
                    snapshots.push(snapshot);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping input");
                    warnings.push(MergeWarning::from(&err));
                }
            }
        }

        if snapshots.is_empty() {
            return Err(MergeError::NoUsableInputs {
                attempted: inputs.len(),
            });
        }

        let mut outcome = self.merge_snapshots(snapshots);
        outcome.warnings = warnings;
        Ok(outcome)
    }

    /// Merge snapshot files and write the result atomically to `output`.
    pub fn merge_to_file<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        output: impl AsRef<Path>,
    ) -> Result<MergeOutcome, MergeError> {
        let outcome = self.merge_files(inputs)?;
        let output = output.as_ref();
        match self.options.shape {
            OutputShape::Tree => write_json_atomic(output, &outcome.tree, self.options.pretty)?,
            OutputShape::Flat => write_json_atomic(output, &outcome.flat, self.options.pretty)?,
        }
        tracing::info!(
            output = %output.display(),
            inputs = outcome.merged_inputs,
            skipped = outcome.warnings.len(),
            shape = %self.options.shape,
            "merge written"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsjson_core::SYNTHETIC_ROOT_NAME;

    fn dir(name: &str, children: Vec<Node>) -> Node {
        Node::new_directory(name).with_children(children)
    }

    fn file(name: &str, size: u64) -> Node {
        Node::new_file(name, size)
    }

    fn names(node: &Node) -> Vec<&str> {
        node.children.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_dedupe_drops_same_named_file() {
        let a = dir("X", vec![file("f.txt", 10)]);
        let b = dir("Y", vec![file("f.txt", 20)]);

        let merged = merge_directories(a, b, true);
        assert_eq!(names(&merged), ["f.txt"]);
        assert_eq!(merged.children[0].size_bytes, 10);
        assert_eq!(merged.size_bytes, 10);
        assert_eq!(merged.child_count, 1);
    }

    #[test]
    fn test_without_dedupe_both_files_survive() {
        let a = dir("X", vec![file("f.txt", 10)]);
        let b = dir("Y", vec![file("f.txt", 20)]);

        let merged = merge_directories(a, b, false);
        assert_eq!(names(&merged), ["f.txt", "f.txt"]);
        assert_eq!(merged.size_bytes, 30);
    }

    #[test]
    fn test_subdirectories_merge_recursively() {
        let a = dir("X", vec![dir("docs", vec![file("a.md", 1)]), file("z", 1)]);
        let b = dir("Y", vec![dir("docs", vec![file("b.md", 2)]), file("y", 4)]);

        let merged = merge_directories(a, b, false);
        assert_eq!(names(&merged), ["docs", "y", "z"]);
        assert_eq!(names(&merged.children[0]), ["a.md", "b.md"]);
        assert_eq!(merged.children[0].size_bytes, 3);
        assert_eq!(merged.size_bytes, 8);
        assert_eq!(merged.name, "X");
    }

    #[test]
    fn test_directory_and_file_with_same_name() {
        let a = dir("X", vec![dir("thing", vec![file("in", 1)])]);
        let b = dir("Y", vec![file("thing", 5)]);

        let merged = merge_directories(a, b, true);
        assert_eq!(merged.child_count, 2);
        assert!(merged.children[0].is_dir);
        assert!(merged.children[1].is_file());
    }

    #[test]
    fn test_residual_duplicates_removed_with_dedupe() {
        let a = dir("X", vec![file("dup", 1), file("dup", 2)]);
        let b = dir("Y", vec![]);
        let merged = merge_directories(a, b, true);
        assert_eq!(merged.child_count, 1);
        assert_eq!(merged.size_bytes, 1);
    }

    #[test]
    fn test_merge_roots_counts() {
        assert_eq!(merge_roots(Vec::new(), false), Node::empty_root());

        let single = dir("only", vec![file("f", 1)]);
        assert_eq!(merge_roots(vec![single.clone()], true), single);
    }

    #[test]
    fn test_merge_roots_names_and_category() {
        let roots = vec![
            dir("alpha", vec![file("a", 1)]),
            dir("beta", vec![file("b", 2)]),
            dir("gamma", vec![file("a", 4)]),
        ];
        let merged = merge_roots(roots, true);
        assert_eq!(merged.name, "alpha+beta+gamma");
        assert_eq!(merged.full_path, "alpha+beta+gamma");
        assert_eq!(merged.category, Category::Merged);
        assert!(merged.is_dir);
        assert_eq!(names(&merged), ["a", "b"]);
        assert_eq!(merged.size_bytes, 3);
    }

    #[test]
    fn test_merge_snapshots_mixed_shapes() {
        let flat = vec![
            Node::new_directory("p").with_path("/p", "/"),
            Node::new_file("one.txt", 5).with_path("/p/one.txt", "/p"),
        ];
        let tree = dir("q", vec![file("two.txt", 7)]);

        let outcome = Merger::default()
            .merge_snapshots(vec![Snapshot::Flat(flat), Snapshot::Tree(tree)]);
        assert_eq!(outcome.merged_inputs, 2);
        assert_eq!(outcome.flat.len(), 4);
        assert_eq!(outcome.tree.name, "p+q");
        assert_eq!(outcome.tree.size_bytes, 12);
        assert_eq!(outcome.tree.count_files(), 2);
    }

    #[test]
    fn test_flat_list_dedupes_by_original_path() {
        let records = vec![
            Node::new_directory("r").with_path("/r", "/"),
            Node::new_file("f", 1).with_path("/r/f", "/r"),
        ];
        let merger = Merger::new(MergeOptions::builder().dedupe(true).build().unwrap());
        let outcome = merger.merge_snapshots(vec![
            Snapshot::Flat(records.clone()),
            Snapshot::Flat(records),
        ]);
        assert_eq!(outcome.flat.len(), 2);
        assert_eq!(outcome.tree.name, "r+r");
        assert_eq!(outcome.tree.count_files(), 1);
    }

    #[test]
    fn test_synthetic_roots_merge_by_name() {
        let a = Node::synthetic_root(vec![dir("x", vec![file("1", 1)]), file("top", 2)]);
        let b = Node::synthetic_root(vec![dir("x", vec![file("2", 3)])]);
        let merged = merge_roots(vec![a, b], false);
        assert_eq!(merged.name, format!("{SYNTHETIC_ROOT_NAME}+{SYNTHETIC_ROOT_NAME}"));
        assert_eq!(names(&merged), ["x", "top"]);
        assert_eq!(merged.children[0].child_count, 2);
    }

    #[test]
    fn test_output_shape_parsing() {
        assert_eq!("FLAT".parse::<OutputShape>().unwrap(), OutputShape::Flat);
        assert_eq!(OutputShape::default().to_string(), "tree");
    }
}
