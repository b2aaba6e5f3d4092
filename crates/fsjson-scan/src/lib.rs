//! Concurrent file system scanning for fsjson.
//!
//! A scan walks one root with a single producer, builds a snapshot
//! [`Node`](fsjson_core::Node) per entry on a fixed worker pool, and
//! collects the nodes into a flat list. Directory listings and content
//! hashing go through a shared [`IoLimiter`] so a slow disk is not flooded
//! with concurrent reads.
//!
//! # Example
//!
//! ```rust,no_run
//! use fsjson_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let result = Scanner::new().scan(&config).unwrap();
//! println!("{} files, {} bytes", result.stats.files, result.stats.bytes);
//!
//! let tree = result.into_tree();
//! println!("root has {} children", tree.child_count);
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use fsjson_scan::{ScanConfig, Scanner};
//!
//! let scanner = Scanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("{:?}: {} entries", progress.phase, progress.collected);
//!     }
//! });
//!
//! scanner.scan(&ScanConfig::new(".")).unwrap();
//! ```

mod entry;
mod limiter;
mod progress;
mod scanner;

pub use entry::{FsProbe, LimitedProbe, StatFacts, build_entry};
pub use limiter::{IoLimiter, IoPermit};
pub use progress::{ScanPhase, ScanProgress, ScanResult, ScanStats};
pub use scanner::Scanner;

// Re-export core types for convenience
pub use fsjson_core::{ExclusionRules, Node, ScanConfig, ScanError};
