//! Scan progress reporting and outcome types.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fsjson_core::{Node, Snapshot, assemble, aggregate};

/// Pipeline stage a progress report was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    /// Traversing the tree and applying exclusions.
    Walking,
    /// Handing paths to workers.
    Dispatching,
    /// Workers building nodes.
    Building,
    /// Collector draining built nodes.
    Collecting,
    /// All entries collected.
    Done,
}

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Current pipeline stage.
    pub phase: ScanPhase,
    /// Paths handed to workers so far.
    pub dispatched: u64,
    /// Nodes built by workers so far.
    pub built: u64,
    /// Entries collected so far.
    pub collected: u64,
    /// Files collected so far.
    pub files: u64,
    /// Directories collected so far.
    pub dirs: u64,
    /// Total file bytes collected so far.
    pub bytes: u64,
    /// Entries dropped because they could not be stat'ed.
    pub dropped: u64,
    /// Most recently collected path.
    pub current_path: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Collection rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.collected as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Shared counters for one scan, updated by the pipeline threads.
#[derive(Debug)]
pub(crate) struct ScanCounters {
    started: Instant,
    dispatched: AtomicU64,
    built: AtomicU64,
    collected: AtomicU64,
    files: AtomicU64,
    dirs: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
    hash_failures: AtomicU64,
    excluded: AtomicU64,
}

impl ScanCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            dispatched: AtomicU64::new(0),
            built: AtomicU64::new(0),
            collected: AtomicU64::new(0),
            files: AtomicU64::new(0),
            dirs: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            hash_failures: AtomicU64::new(0),
            excluded: AtomicU64::new(0),
        }
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a node finished by a worker, returning the new built count.
    pub fn record_built(&self) -> u64 {
        self.built.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hash_failure(&self) {
        self.hash_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a collected node, returning the new collected count.
    pub fn record_collected(&self, node: &Node) -> u64 {
        if node.is_dir {
            self.dirs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.files.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(node.size_bytes, Ordering::Relaxed);
        }
        self.collected.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self, phase: ScanPhase, current_path: PathBuf) -> ScanProgress {
        ScanProgress {
            phase,
            dispatched: self.dispatched.load(Ordering::Relaxed),
            built: self.built.load(Ordering::Relaxed),
            collected: self.collected.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            dirs: self.dirs.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            current_path,
            elapsed: self.started.elapsed(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            files: self.files.load(Ordering::Relaxed),
            dirs: self.dirs.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            hash_failures: self.hash_failures.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
        }
    }
}

/// Totals for a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Files collected.
    pub files: u64,
    /// Directories collected, including the root.
    pub dirs: u64,
    /// Sum of file sizes.
    pub bytes: u64,
    /// Entries that vanished or could not be stat'ed.
    pub dropped: u64,
    /// Files whose content could not be read for hashing.
    pub hash_failures: u64,
    /// Paths pruned by exclusion rules (a pruned directory counts once).
    pub excluded: u64,
}

/// Outcome of a scan: the flat entry list plus bookkeeping.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Canonical root that was scanned.
    pub root_path: PathBuf,
    /// Collected nodes, in arrival order.
    pub entries: Vec<Node>,
    /// Totals.
    pub stats: ScanStats,
    /// When the scan started.
    pub scanned_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl ScanResult {
    /// Assemble and aggregate the entries into a single tree.
    pub fn into_tree(self) -> Node {
        let mut root = assemble(self.entries);
        aggregate(&mut root);
        root
    }

    /// Package the entries as a snapshot of the requested shape.
    pub fn into_snapshot(self, tree: bool) -> Snapshot {
        if tree {
            Snapshot::Tree(self.into_tree())
        } else {
            Snapshot::Flat(self.entries)
        }
    }
}
