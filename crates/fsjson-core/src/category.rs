//! File categories derived from extensions.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Broad content category of an entry.
///
/// Unknown category strings in a snapshot decode as [`Category::Other`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Image,
    Video,
    Audio,
    Text,
    Code,
    /// Sentinel for roots produced by merging snapshots.
    Merged,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Categorize a lowercase or mixed-case extension (no leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" => Self::Image,
            "mp4" | "avi" | "mkv" | "mov" | "webm" => Self::Video,
            "mp3" | "wav" | "flac" | "aac" | "ogg" => Self::Audio,
            "txt" | "md" | "log" | "csv" => Self::Text,
            "go" | "js" | "ts" | "py" | "html" | "css" | "json" | "yaml" | "yml" | "rs"
            | "java" | "c" | "cpp" | "cs" | "php" | "sh" => Self::Code,
            _ => Self::Other,
        }
    }
}
