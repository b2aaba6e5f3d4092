//! Analysis over fsjson snapshots.
//!
//! This crate works on assembled snapshot trees:
//!
//! - **Merging** - Combine several snapshots into one tree, optionally
//!   dropping same-named files per directory
//! - **Duplicate detection** - Group files by their recorded content hash
//! - **Search** - Filter nodes by name pattern, category, size and time
//!
//! # Merging
//!
//! ```rust,no_run
//! use fsjson_analyze::{MergeOptions, Merger, OutputShape};
//!
//! let options = MergeOptions::builder()
//!     .dedupe(true)
//!     .shape(OutputShape::Tree)
//!     .build()
//!     .unwrap();
//! let outcome = Merger::new(options)
//!     .merge_to_file(&["a.json", "b.json"], "merged.json")
//!     .unwrap();
//! println!("merged {} inputs", outcome.merged_inputs);
//! ```
//!
//! # Duplicate Detection
//!
//! ```rust,no_run
//! use fsjson_analyze::DuplicateFinder;
//! use fsjson_core::Snapshot;
//!
//! let tree = Snapshot::read("scan.json").unwrap().into_tree();
//! let report = DuplicateFinder::new().find_duplicates(&tree);
//! for group in &report.groups {
//!     println!("{} x{}: {:?}", group.hash, group.count, group.paths);
//! }
//! ```
//!
//! # Search
//!
//! ```rust,no_run
//! use fsjson_analyze::{NamePattern, SearchQuery, SizeFilter, search};
//! use fsjson_core::Snapshot;
//!
//! let tree = Snapshot::read("scan.json").unwrap().into_tree();
//! let query = SearchQuery::builder()
//!     .name(NamePattern::new("*.log").unwrap())
//!     .size(vec![SizeFilter::Gt(1 << 20)])
//!     .build()
//!     .unwrap();
//! let page = search(&tree, &query);
//! println!("{} of {} matches", page.results.len(), page.total);
//! ```

mod duplicates;
mod merge;
mod search;

pub use duplicates::{DuplicateConfig, DuplicateConfigBuilder, DuplicateFinder, DuplicateGroup, DuplicateReport};
pub use merge::{
    MergeError, MergeOptions, MergeOptionsBuilder, MergeOutcome, MergeWarning, Merger,
    OutputShape, merge_directories, merge_roots,
};
pub use search::{
    NamePattern, Page, QueryError, SearchHit, SearchPage, SearchQuery, SearchQueryBuilder,
    SizeFilter, TimeFilter, search,
};

// Re-export core types
pub use fsjson_core::{Category, Node, Snapshot};
