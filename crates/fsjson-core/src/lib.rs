//! Core types for fsjson.
//!
//! This crate provides the snapshot data model shared by the scanner and
//! the analysis tools: the [`Node`] record, its categories and display
//! formatting, scan configuration, tree assembly and aggregation, and
//! atomic snapshot persistence in flat or tree shape.

mod category;
mod config;
mod error;
mod format;
mod node;
mod snapshot;
mod tree;

pub use category::Category;
pub use config::{
    DEFAULT_IO_LIMIT, DEFAULT_PROGRESS_INTERVAL, ExclusionRules, ScanConfig, ScanConfigBuilder,
};
pub use error::{ScanError, SnapshotError, Warning, WarningKind};
pub use format::{human_size, name_hash};
pub use node::{EMPTY_ROOT_NAME, Node, SYNTHETIC_ROOT_NAME, canonical_order, split_extension};
pub use snapshot::{Snapshot, write_json_atomic};
pub use tree::{aggregate, assemble, flatten};
