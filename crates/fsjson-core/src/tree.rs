//! Tree assembly from flat records and bottom-up aggregation.
//!
//! Assembly indexes records by `full_path` and attaches every record to
//! the record whose path equals its `parent_dir`. Records without a parent
//! in the list become root candidates; more than one is wrapped in a
//! synthetic root. Every rebuilt directory satisfies the aggregate
//! invariants: size equals the sum of its children, `child_count` equals
//! the number of children, and children are in canonical order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::format::{human_size, name_hash};
use crate::node::Node;

/// Rebuild a single tree from a flat, unordered list of records.
///
/// Nested `children` on the input records are discarded; flat records are
/// leaves by definition.
pub fn assemble(flat: Vec<Node>) -> Node {
    if flat.is_empty() {
        return Node::empty_root();
    }

    let known: HashSet<String> = flat.iter().map(|n| n.full_path.clone()).collect();
    let mut pending: HashMap<String, Vec<Node>> = HashMap::with_capacity(flat.len());
    let mut roots = Vec::new();
    let total = flat.len();

    for mut node in flat {
        if node.parent_dir == "." {
            node.parent_dir.clear();
        }
        node.children.clear();
        if node.parent_dir != node.full_path && known.contains(&node.parent_dir) {
            pending.entry(node.parent_dir.clone()).or_default().push(node);
        } else {
            roots.push(node);
        }
    }

    let mut built: Vec<Node> = roots
        .into_iter()
        .map(|root| build(root, &mut pending))
        .collect();

    let orphaned: usize = pending.values().map(Vec::len).sum();
    if orphaned > 0 {
        tracing::debug!(orphaned, total, "dropped records unreachable from any root");
    }

    if built.len() == 1 {
        return built.remove(0);
    }
    Node::synthetic_root(built)
}

fn build(mut node: Node, pending: &mut HashMap<String, Vec<Node>>) -> Node {
    let kids = pending.remove(&node.full_path).unwrap_or_default();
    node.children = kids.into_iter().map(|kid| build(kid, pending)).collect();
    if node.is_dir {
        node.refresh_directory();
    }
    node
}

/// Recompute directory aggregates bottom-up. Returns the subtree size.
///
/// For each directory: size is the sum of its children, `created` the
/// earliest set child creation time, `updated` the latest set child
/// modification time, and an empty content hash is replaced by the
/// name-derived placeholder. Files are left untouched. Running it twice
/// yields the same tree.
pub fn aggregate(node: &mut Node) -> u64 {
    if !node.is_dir {
        return node.size_bytes;
    }

    let mut total = 0u64;
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for child in &mut node.children {
        total = total.saturating_add(aggregate(child));
        if let Some(created) = child.created {
            earliest = Some(earliest.map_or(created, |e| e.min(created)));
        }
        if let Some(updated) = child.updated {
            latest = Some(latest.map_or(updated, |l| l.max(updated)));
        }
    }

    node.size_bytes = total;
    node.size_human = human_size(total);
    node.child_count = node.children.len();
    if earliest.is_some() {
        node.created = earliest;
    }
    if latest.is_some() {
        node.updated = latest;
    }
    if node.content_hash.is_empty() {
        node.content_hash = name_hash(&node.name);
    }
    total
}

/// Flatten a tree into pre-order records without nested children.
pub fn flatten(root: &Node) -> Vec<Node> {
    root.iter()
        .map(|node| Node {
            children: Vec::new(),
            ..node.clone()
        })
        .collect()
}
