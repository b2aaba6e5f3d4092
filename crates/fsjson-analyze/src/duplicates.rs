//! Duplicate file detection over snapshot content hashes.
//!
//! Snapshots already carry a content hash for every file, so detection is
//! a single grouping pass over the tree; no file is reopened.

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use fsjson_core::Node;

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into), default)]
pub struct DuplicateConfig {
    /// Minimum file size to consider (0 = every file).
    pub min_size: u64,

    /// Maximum number of groups to return (0 = unlimited).
    pub max_groups: usize,
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// Files sharing one content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content hash shared by every member.
    pub hash: String,

    /// Original paths of the members, in traversal order.
    pub paths: Vec<String>,

    /// Number of members.
    pub count: usize,

    /// Summed size of all members.
    pub size: u64,
}

impl DuplicateGroup {
    /// Bytes reclaimable by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        match self.count {
            0 => 0,
            n => self.size - self.size / n as u64,
        }
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups ordered by member count, then summed size, both descending.
    pub groups: Vec<DuplicateGroup>,

    /// Number of groups found, before `max_groups` truncation.
    pub total_groups: usize,

    /// Number of files belonging to any group, before truncation.
    pub total_files: usize,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Duplicate file finder.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: DuplicateConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new duplicate finder with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Group the files of `root` by content hash.
    ///
    /// Directories and files without a hash never participate.
    pub fn find_duplicates(&self, root: &Node) -> DuplicateReport {
        let mut by_hash: IndexMap<&str, Vec<&Node>> = IndexMap::new();
        for node in root.iter() {
            if node.is_dir || node.content_hash.is_empty() || node.size_bytes < self.config.min_size
            {
                continue;
            }
            by_hash.entry(node.content_hash.as_str()).or_default().push(node);
        }

        let mut groups: Vec<DuplicateGroup> = by_hash
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(hash, members)| DuplicateGroup {
                hash: hash.to_string(),
                count: members.len(),
                size: members
                    .iter()
                    .fold(0u64, |total, n| total.saturating_add(n.size_bytes)),
                paths: members.iter().map(|n| n.full_path_orig.clone()).collect(),
            })
            .collect();

        // Stable, so equal groups stay in first-seen order.
        groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.size.cmp(&a.size)));

        let total_groups = groups.len();
        let total_files = groups.iter().map(|g| g.count).sum();
        if self.config.max_groups > 0 {
            groups.truncate(self.config.max_groups);
        }

        tracing::debug!(total_groups, total_files, "duplicate detection finished");
        DuplicateReport {
            groups,
            total_groups,
            total_files,
        }
    }
}
