//! Error and warning types shared across fsjson crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a scan.
///
/// Per-entry failures never surface here; they are counted and skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for the root path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Root path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be read.
    #[error("Cannot read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is neither a flat array nor a tree object.
    #[error("Unrecognized snapshot format in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// The destination could not be written; no partial file is left behind.
    #[error("Cannot write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// Classify this error for warning reports.
    pub fn kind(&self) -> WarningKind {
        match self {
            Self::Read { .. } => WarningKind::ReadError,
            Self::Format { .. } => WarningKind::FormatError,
            Self::Write { .. } => WarningKind::WriteError,
        }
    }

    /// Path of the snapshot involved.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Read { path, .. } | Self::Format { path, .. } | Self::Write { path, .. } => path,
        }
    }
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Error reading a file or directory.
    ReadError,
    /// Input was not a recognizable snapshot.
    FormatError,
    /// Output could not be written.
    WriteError,
}

/// Non-fatal problem encountered while processing, reported alongside results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl Warning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }
}

impl From<&SnapshotError> for Warning {
    fn from(err: &SnapshotError) -> Self {
        Self::new(err.path().clone(), err.to_string(), err.kind())
    }
}
