//! Catalog entities: discs, their candidate titles, and the ordered catalog.
//!
//! Field names on the wire are fixed (`Path`, `Title`, `Playlists`, ...) so that
//! catalogs written by earlier runs keep loading. Every field carries a serde
//! default: numbers fall back to [`UNSET`], strings to empty, `Processed` to
//! false and the title list to empty.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sentinel for numeric fields that have not been populated.
pub const UNSET: i64 = -1;

fn unset_i32() -> i32 {
    UNSET as i32
}

fn unset_i64() -> i64 {
    UNSET
}

/// One extractable title (playlist) inside a disc image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    /// Tool-assigned ordinal, unique within the disc's enumeration.
    #[serde(rename = "TitleNum", default = "unset_i32")]
    pub index: i32,
    /// Source stream identifier, e.g. `00800.mpls`.
    #[serde(rename = "SourceFileName", default)]
    pub source_file_name: String,
    /// Human-readable description reported by the tool.
    #[serde(rename = "Description", default)]
    pub description: String,
    /// File name the tool will write for this title.
    #[serde(rename = "FileOutput", default)]
    pub file_output: String,
    /// Runtime as a display string (`h:mm:ss`); never re-parsed.
    #[serde(rename = "Runtime", default)]
    pub runtime: String,
    /// Chapter count, or [`UNSET`].
    #[serde(rename = "Chapters", default = "unset_i32")]
    pub chapters: i32,
    /// Size in bytes, or [`UNSET`].
    #[serde(rename = "Size", default = "unset_i64")]
    pub size: i64,
}

impl Default for Title {
    fn default() -> Self {
        Self {
            index: unset_i32(),
            source_file_name: String::new(),
            description: String::new(),
            file_output: String::new(),
            runtime: String::new(),
            chapters: unset_i32(),
            size: UNSET,
        }
    }
}

/// One disc image under consideration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disc {
    /// Path to the image; the stable identity of the disc.
    #[serde(rename = "Path", default)]
    pub path: PathBuf,
    /// Display title, empty until discovered.
    #[serde(rename = "Title", default)]
    pub title: String,
    /// Image size in bytes, or [`UNSET`].
    #[serde(rename = "Size", default = "unset_i64")]
    pub size: i64,
    /// Set only after the main feature was remuxed successfully.
    #[serde(rename = "Processed", default)]
    pub processed: bool,
    /// Main-feature candidates in enumeration order.
    #[serde(rename = "Playlists", default)]
    pub titles: Vec<Title>,
}

impl Default for Disc {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            title: String::new(),
            size: UNSET,
            processed: false,
            titles: Vec::new(),
        }
    }
}

/// Ordered discs; order is the remux processing order.
pub type Catalog = Vec<Disc>;

impl Disc {
    /// A freshly scanned disc with only path and size known.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: clamp_size(size),
            ..Self::default()
        }
    }

    /// The title that gets remuxed. Only the first candidate is ever used.
    pub fn main_feature(&self) -> Option<&Title> {
        self.titles.first()
    }

    /// Inspection found no candidate; the disc cannot be remuxed until it is
    /// inspected again.
    pub fn is_unprocessable(&self) -> bool {
        self.titles.is_empty()
    }

    /// Name used in logs: the display title, or the image file name.
    pub fn label(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Name of the folder holding the image, used as the output directory name.
    pub fn folder_name(&self) -> Option<&str> {
        self.path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }
}

/// Convert a byte count into the signed on-disk representation.
pub(crate) fn clamp_size(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}
