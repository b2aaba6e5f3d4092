//! Producer/worker/collector scan pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;

use fsjson_core::{ExclusionRules, Node, ScanConfig, ScanError};

use crate::entry::{FsProbe, LimitedProbe, StatFacts, build_entry};
use crate::limiter::IoLimiter;
use crate::progress::{ScanCounters, ScanPhase, ScanProgress, ScanResult};

/// Queue slots per worker for both the work and result queues.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Concurrent scanner producing flat snapshot entries.
///
/// One producer walks the tree and feeds a bounded work queue, a fixed
/// pool of workers stats each path and builds its node, and the calling
/// thread collects nodes in arrival order.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

/// Per-scan state shared by the pipeline threads.
struct Pipeline<'a> {
    root_path: &'a Path,
    orig_root: &'a Path,
    skip_hash: bool,
    progress_interval: u64,
    counters: Arc<ScanCounters>,
    progress_tx: &'a broadcast::Sender<ScanProgress>,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the configured root.
    ///
    /// Only an unusable root is an error. Entries that vanish or cannot be
    /// stat'ed are counted in the result's stats and skipped.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScanResult, ScanError> {
        let probe = LimitedProbe::new(IoLimiter::new(config.io_limit));
        self.scan_with_probe(config, &probe)
    }

    /// Scan using a caller-supplied probe for listings and hashing.
    pub fn scan_with_probe(
        &self,
        config: &ScanConfig,
        probe: &dyn FsProbe,
    ) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        let scanned_at = Utc::now();

        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;
        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let workers = config.worker_count();
        let depth = workers * QUEUE_DEPTH_PER_WORKER;
        tracing::info!(
            root = %root_path.display(),
            workers,
            io_limit = config.io_limit,
            skip_hash = config.skip_hash,
            "starting scan"
        );

        let pipeline = Pipeline {
            root_path: &root_path,
            orig_root: &config.root,
            skip_hash: config.skip_hash,
            progress_interval: config.progress_interval,
            counters: Arc::new(ScanCounters::new()),
            progress_tx: &self.progress_tx,
        };
        pipeline.report(ScanPhase::Walking, root_path.clone());

        let (job_tx, job_rx) = bounded::<PathBuf>(depth);
        let (node_tx, node_rx) = bounded::<Node>(depth);
        let rules = config.exclusion_rules();

        let entries = thread::scope(|s| {
            let pipeline = &pipeline;
            s.spawn(move || pipeline.produce(rules, job_tx));
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let node_tx = node_tx.clone();
                s.spawn(move || pipeline.work(job_rx, node_tx, probe));
            }
            drop(job_rx);
            drop(node_tx);
            pipeline.collect(node_rx)
        });

        let stats = pipeline.counters.stats();
        let duration = start.elapsed();
        pipeline.report(ScanPhase::Done, root_path.clone());
        tracing::info!(
            files = stats.files,
            dirs = stats.dirs,
            bytes = stats.bytes,
            dropped = stats.dropped,
            hash_failures = stats.hash_failures,
            elapsed_ms = duration.as_millis() as u64,
            "scan complete"
        );

        Ok(ScanResult {
            root_path,
            entries,
            stats,
            scanned_at,
            duration,
        })
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline<'_> {
    fn report(&self, phase: ScanPhase, current_path: PathBuf) {
        let progress = self.counters.snapshot(phase, current_path);
        tracing::debug!(
            phase = ?progress.phase,
            dispatched = progress.dispatched,
            collected = progress.collected,
            "scan progress"
        );
        // No subscribers is fine.
        let _ = self.progress_tx.send(progress);
    }

    fn due(&self, count: u64) -> bool {
        self.progress_interval > 0 && count % self.progress_interval == 0
    }

    /// Walk the root serially, pruning excluded subtrees before descent.
    /// Dropping `job_tx` on return closes the work queue.
    fn produce(&self, rules: ExclusionRules, job_tx: Sender<PathBuf>) {
        let counters = Arc::clone(&self.counters);
        let walker = WalkDir::new(self.root_path)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .process_read_dir(move |_depth, _path, _state, children| {
                if rules.is_empty() {
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) if rules.matches(&entry.path()) => {
                        counters.record_excluded();
                        false
                    }
                    _ => true,
                });
            });

        let mut dispatched = 0u64;
        for entry in walker {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    tracing::debug!(error = %err, "walk error");
                    self.counters.record_dropped();
                    continue;
                }
            };
            if job_tx.send(path).is_err() {
                break;
            }
            self.counters.record_dispatch();
            dispatched += 1;
            if self.due(dispatched) {
                self.report(ScanPhase::Dispatching, PathBuf::new());
            }
        }
        tracing::debug!(dispatched, "walk finished");
    }

    /// Build nodes until the work queue closes. Dropping `node_tx` on
    /// return signals this worker is done.
    fn work(&self, job_rx: Receiver<PathBuf>, node_tx: Sender<Node>, probe: &dyn FsProbe) {
        for path in job_rx {
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "stat failed");
                    self.counters.record_dropped();
                    continue;
                }
            };
            let facts = StatFacts::from(&metadata);
            let orig = self.orig_path(&path);
            let node = build_entry(&path, &orig, &facts, self.skip_hash, probe);
            if !self.skip_hash && !node.is_dir && node.content_hash.is_empty() {
                self.counters.record_hash_failure();
            }
            if self.due(self.counters.record_built()) {
                self.report(ScanPhase::Building, path);
            }
            if node_tx.send(node).is_err() {
                break;
            }
        }
    }

    /// Drain built nodes until every worker is done.
    fn collect(&self, node_rx: Receiver<Node>) -> Vec<Node> {
        let mut entries = Vec::new();
        for node in node_rx {
            let collected = self.counters.record_collected(&node);
            if self.due(collected) {
                self.report(ScanPhase::Collecting, PathBuf::from(&node.full_path));
            }
            entries.push(node);
        }
        entries
    }

    /// The path as the user addressed it, rebased from the canonical root.
    fn orig_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(self.root_path) {
            Ok(rel) if rel.as_os_str().is_empty() => self.orig_root.to_path_buf(),
            Ok(rel) => self.orig_root.join(rel),
            Err(_) => path.to_path_buf(),
        }
    }
}
