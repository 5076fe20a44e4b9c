//! Scanner module for discovering disc images in library directories.
//!
//! Recursively walks the given roots and returns every file with an `.iso`
//! extension (case-insensitive). Images whose path is not valid UTF-8 are
//! skipped with a warning, since the catalog cannot store them.

use crate::catalog::Disc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Disc image extension (matched case-insensitively).
pub const DISC_IMAGE_EXTENSION: &str = "iso";

/// Errors raised while scanning library roots.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A root directory does not exist.
    #[error("Library root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    /// Directory traversal failed.
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Reading file metadata failed.
    #[error("Failed to stat {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Checks if a file has the disc image extension (case-insensitive).
pub fn is_disc_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DISC_IMAGE_EXTENSION))
        .unwrap_or(false)
}

/// Scans the given roots for disc images.
///
/// Roots are visited in the order given; within a root, entries are visited in
/// file-name order so repeated scans produce the same catalog order.
pub fn scan_disc_images(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let mut images = Vec::new();

    for root in roots {
        if !root.exists() {
            return Err(ScanError::MissingRoot(root.clone()));
        }

        let walker = WalkDir::new(root).sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_disc_image(entry.path()) {
                continue;
            }
            // Catalog paths are stored as JSON strings
            if entry.path().to_str().is_none() {
                warn!(path = %entry.path().display(), "skipping disc image with non-UTF-8 path");
                continue;
            }
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

/// Builds catalog entries (path and size only) for scanned images.
pub fn discs_from_paths(paths: Vec<PathBuf>) -> Result<Vec<Disc>, ScanError> {
    paths
        .into_iter()
        .map(|path| {
            let metadata = std::fs::metadata(&path).map_err(|source| ScanError::Metadata {
                path: path.clone(),
                source,
            })?;
            Ok(Disc::new(path, metadata.len()))
        })
        .collect()
}
