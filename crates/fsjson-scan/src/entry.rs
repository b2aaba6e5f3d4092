//! Per-entry node construction.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use compact_str::CompactString;

use fsjson_core::{Category, Node, human_size, name_hash, split_extension};

use crate::limiter::IoLimiter;

/// Files at least this large are hashed with the multi-threaded mmap path.
const PARALLEL_HASH_THRESHOLD: u64 = 16 * 1024 * 1024;

/// The subset of `stat` output a node is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatFacts {
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub perm: CompactString,
}

impl From<&Metadata> for StatFacts {
    fn from(metadata: &Metadata) -> Self {
        Self {
            is_dir: metadata.is_dir(),
            len: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            perm: permission_string(metadata),
        }
    }
}

/// Expensive filesystem calls made while building a node.
pub trait FsProbe: Send + Sync {
    /// Number of direct entries of a directory.
    fn count_entries(&self, dir: &Path) -> io::Result<usize>;

    /// Lowercase hex content hash of a file.
    fn hash_file(&self, path: &Path) -> io::Result<String>;
}

/// Probe hitting the real filesystem, with every call gated by an
/// [`IoLimiter`].
#[derive(Debug, Clone, Default)]
pub struct LimitedProbe {
    limiter: IoLimiter,
}

impl LimitedProbe {
    /// Create a probe whose listings and hashes share `limiter`.
    pub fn new(limiter: IoLimiter) -> Self {
        Self { limiter }
    }

    /// The gate shared by every call of this probe.
    pub fn limiter(&self) -> &IoLimiter {
        &self.limiter
    }
}

impl FsProbe for LimitedProbe {
    fn count_entries(&self, dir: &Path) -> io::Result<usize> {
        self.limiter.run(|| -> io::Result<usize> {
            Ok(std::fs::read_dir(dir)?.filter(|e| e.is_ok()).count())
        })
    }

    fn hash_file(&self, path: &Path) -> io::Result<String> {
        self.limiter.run(|| -> io::Result<String> {
            let mut hasher = blake3::Hasher::new();
            let len = std::fs::metadata(path)?.len();
            if len >= PARALLEL_HASH_THRESHOLD {
                hasher.update_mmap_rayon(path)?;
            } else {
                hasher.update_mmap(path)?;
            }
            Ok(hasher.finalize().to_hex().to_string())
        })
    }
}

/// Build the snapshot node for one scanned path.
///
/// `orig_path` is the path as the user addressed it; `path` is canonical.
/// A failed listing leaves `child_count` at 0 and a failed hash leaves the
/// content hash empty; neither aborts.
pub fn build_entry(
    path: &Path,
    orig_path: &Path,
    facts: &StatFacts,
    skip_hash: bool,
    probe: &dyn FsProbe,
) -> Node {
    let name: CompactString = path
        .file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()));
    let parent_dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut node = Node {
        is_dir: facts.is_dir,
        full_path: path.to_string_lossy().into_owned(),
        full_path_orig: orig_path.to_string_lossy().into_owned(),
        parent_dir,
        created: facts.created,
        updated: facts.modified,
        perm: facts.perm.clone(),
        ..Node::default()
    };

    if facts.is_dir {
        node.name_only = name.clone();
        node.size_human = human_size(0);
        node.child_count = probe.count_entries(path).unwrap_or_else(|err| {
            tracing::debug!(path = %path.display(), error = %err, "listing failed");
            0
        });
        if !skip_hash {
            node.content_hash = name_hash(&name);
        }
    } else {
        let (name_only, ext) = split_extension(&name);
        node.category = Category::from_extension(&ext);
        node.name_only = name_only;
        node.ext = ext;
        node.size_bytes = facts.len;
        node.size_human = human_size(facts.len);
        if !skip_hash {
            node.content_hash = probe.hash_file(path).unwrap_or_else(|err| {
                tracing::debug!(path = %path.display(), error = %err, "hashing failed");
                String::new()
            });
        }
    }

    node.name = name;
    node
}

#[cfg(unix)]
fn permission_string(metadata: &Metadata) -> CompactString {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else {
        '-'
    };

    let mut out = CompactString::default();
    out.push(kind);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permission_string(metadata: &Metadata) -> CompactString {
    let kind = if metadata.is_dir() { 'd' } else { '-' };
    let write = if metadata.permissions().readonly() { '-' } else { 'w' };
    let mut out = CompactString::default();
    out.push(kind);
    for _ in 0..3 {
        out.push('r');
        out.push(write);
        out.push('-');
    }
    out
}
