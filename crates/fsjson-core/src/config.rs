//! Scan configuration types.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default bound on concurrent listing/hashing calls.
pub const DEFAULT_IO_LIMIT: usize = 16;

/// Default number of collected entries between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Configuration for a scan.
///
/// Passed by value through the pipeline; nothing about a scan lives in
/// process-wide state.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Case-insensitive substrings; any path containing one is pruned.
    #[builder(default)]
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// Number of worker threads (0 = one per logical core).
    #[builder(default = "0")]
    #[serde(default)]
    pub workers: usize,

    /// Maximum concurrent listing/hashing calls (0 = unlimited).
    #[builder(default = "DEFAULT_IO_LIMIT")]
    #[serde(default = "default_io_limit")]
    pub io_limit: usize,

    /// Skip content hashing entirely.
    #[builder(default = "false")]
    #[serde(default)]
    pub skip_hash: bool,

    /// Entries collected between progress reports (0 = never report).
    #[builder(default = "DEFAULT_PROGRESS_INTERVAL")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_io_limit() -> usize {
    DEFAULT_IO_LIMIT
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl From<ScanConfigBuilderError> for ScanError {
    fn from(err: ScanConfigBuilderError) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclusions: Vec::new(),
            workers: 0,
            io_limit: DEFAULT_IO_LIMIT,
            skip_hash: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Effective worker count, resolving 0 to the logical core count.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n => n,
        }
    }

    /// Compiled exclusion rules, cheap to clone into walker callbacks.
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::new(self.exclusions.as_slice())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Case-insensitive substring rules matched against full paths.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    needles: Arc<[String]>,
}

impl ExclusionRules {
    /// Build rules from raw patterns; blank patterns are ignored.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let needles: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            needles: needles.into(),
        }
    }

    /// Check whether a path should be pruned.
    pub fn matches(&self, path: &Path) -> bool {
        if self.needles.is_empty() {
            return false;
        }
        let haystack = path.to_string_lossy().to_lowercase();
        self.needles.iter().any(|n| haystack.contains(n.as_str()))
    }

    /// Check if no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }
}
