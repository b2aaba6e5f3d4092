//! Attribute search over a snapshot tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fsjson_core::{Category, Node};

/// Errors building a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The name pattern could not be compiled.
    #[error("Invalid name pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A size range whose lower bound exceeds its upper bound.
    #[error("Invalid size range: {min} > {max}")]
    InvalidRange { min: u64, max: u64 },
}

/// Case-insensitive wildcard pattern matched against the whole name.
///
/// `*` matches any run of characters and `?` exactly one; everything else
/// is literal.
#[derive(Clone)]
pub struct NamePattern {
    raw: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile a wildcard pattern.
    pub fn new(pattern: &str) -> Result<Self, QueryError> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(if c == '*' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|source| QueryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// Check whether a name matches.
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamePattern").field(&self.raw).finish()
    }
}

/// Size clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFilter {
    Gt(u64),
    Gte(u64),
    Lt(u64),
    Lte(u64),
    Eq(u64),
    /// Inclusive on both ends.
    Between { min: u64, max: u64 },
}

impl SizeFilter {
    /// Inclusive range clause; rejects `min > max`.
    pub fn between(min: u64, max: u64) -> Result<Self, QueryError> {
        if min > max {
            return Err(QueryError::InvalidRange { min, max });
        }
        Ok(Self::Between { min, max })
    }

    /// Whether `size` satisfies this clause.
    pub fn matches(&self, size: u64) -> bool {
        match *self {
            Self::Gt(v) => size > v,
            Self::Gte(v) => size >= v,
            Self::Lt(v) => size < v,
            Self::Lte(v) => size <= v,
            Self::Eq(v) => size == v,
            Self::Between { min, max } => (min..=max).contains(&size),
        }
    }
}

/// Time clause. An unset timestamp satisfies none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    Gt(DateTime<Utc>),
    Gte(DateTime<Utc>),
    Lt(DateTime<Utc>),
    Lte(DateTime<Utc>),
}

impl TimeFilter {
    /// Whether `time` is set and satisfies this clause.
    pub fn matches(&self, time: Option<DateTime<Utc>>) -> bool {
        let Some(time) = time else {
            return false;
        };
        match *self {
            Self::Gt(t) => time > t,
            Self::Gte(t) => time >= t,
            Self::Lt(t) => time < t,
            Self::Lte(t) => time <= t,
        }
    }
}

/// Window into the ordered matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Matches to skip.
    pub offset: usize,
    /// Maximum matches to return; zero or negative means no limit.
    pub limit: i64,
}

impl Page {
    /// Skip `offset` matches, then return at most `limit` (all when `limit <= 0`).
    pub fn new(offset: usize, limit: i64) -> Self {
        Self { offset, limit }
    }
}

/// Conjunction of clauses. Unset clauses match everything.
#[derive(Debug, Clone, Default, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct SearchQuery {
    /// Name pattern.
    pub name: Option<NamePattern>,

    /// Only nodes whose path starts with this prefix are considered.
    pub start_path: Option<String>,

    /// Allowed categories; empty allows all.
    pub categories: BTreeSet<Category>,

    /// Size clauses.
    pub size: Vec<SizeFilter>,

    /// Creation time clauses.
    pub created: Vec<TimeFilter>,

    /// Modification time clauses.
    pub modified: Vec<TimeFilter>,

    /// Pagination.
    pub page: Page,
}

impl SearchQuery {
    /// Create a new query builder.
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::default()
    }

    fn matches(&self, node: &Node) -> bool {
        if let Some(pattern) = &self.name {
            if !pattern.matches(&node.name) {
                return false;
            }
        }
        if !self.categories.is_empty() && !self.categories.contains(&node.category) {
            return false;
        }
        self.size.iter().all(|f| f.matches(node.size_bytes))
            && self.created.iter().all(|f| f.matches(node.created))
            && self.modified.iter().all(|f| f.matches(node.updated))
    }
}

/// One matching node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchHit {
    pub full_path_orig: String,
    pub size_bytes: u64,
    #[serde(rename = "FileType")]
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl From<&Node> for SearchHit {
    fn from(node: &Node) -> Self {
        Self {
            full_path_orig: node.full_path_orig.clone(),
            size_bytes: node.size_bytes,
            category: node.category,
            modified: node.updated,
            created: node.created,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Matches on this page, in traversal order.
    pub results: Vec<SearchHit>,
    /// Per-category counts over `results`.
    pub stats: BTreeMap<Category, usize>,
    /// Matches before pagination.
    pub total: usize,
}

/// Run `query` against the tree rooted at `root`.
pub fn search(root: &Node, query: &SearchQuery) -> SearchPage {
    let start = query
        .start_path
        .as_deref()
        .map(|p| p.trim_end_matches(['/', '\\']))
        .filter(|p| !p.is_empty());

    let mut matches = Vec::new();
    walk(root, start, query, &mut matches);
    let total = matches.len();

    let Page { offset, limit } = query.page;
    let results: Vec<SearchHit> = if offset >= total {
        Vec::new()
    } else {
        let rest = matches.into_iter().skip(offset);
        match usize::try_from(limit) {
            Ok(limit) if limit > 0 => rest.take(limit).map(SearchHit::from).collect(),
            _ => rest.map(SearchHit::from).collect(),
        }
    };

    let mut stats = BTreeMap::new();
    for hit in &results {
        *stats.entry(hit.category).or_insert(0) += 1;
    }

    tracing::debug!(total, returned = results.len(), offset, limit, "search finished");
    SearchPage {
        results,
        stats,
        total,
    }
}

fn walk<'a>(node: &'a Node, start: Option<&str>, query: &SearchQuery, out: &mut Vec<&'a Node>) {
    let inside = match start {
        None => true,
        Some(prefix) if node.full_path.starts_with(prefix) => true,
        Some(prefix) => {
            let on_the_way = node.is_dir
                && (node.full_path.is_empty()
                    || node.category == Category::Merged
                    || prefix.starts_with(node.full_path.as_str()));
            if !on_the_way {
                return;
            }
            false
        }
    };

    if inside && query.matches(node) {
        out.push(node);
    }
    // Merged directories mix inputs, so every descendant is rechecked.
    for child in &node.children {
        walk(child, start, query, out);
    }
}
