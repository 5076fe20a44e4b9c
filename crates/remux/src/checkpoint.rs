//! Checkpoint store for persisting the catalog.
//!
//! The catalog is written as a pretty-printed JSON array of discs. Writes go to
//! a hidden sibling file that is synced and then renamed over the destination,
//! so a crash mid-write leaves the previous checkpoint intact.

use crate::catalog::Catalog;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Filesystem error on the checkpoint or its temporary file.
    #[error("Checkpoint IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document is not a valid catalog.
    #[error("Invalid catalog document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path, source: io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Temporary path used while writing `destination`.
pub fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog.json".to_string());
    destination.with_file_name(format!(".{}.tmp", name))
}

/// Writes the whole catalog to `destination`.
pub fn save_catalog(catalog: &Catalog, destination: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }

    let json = serde_json::to_string_pretty(catalog).map_err(|source| CheckpointError::Json {
        path: destination.to_path_buf(),
        source,
    })?;

    let staging = staging_path(destination);
    let write_staging = || -> io::Result<()> {
        let mut file = File::create(&staging)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    };
    if let Err(e) = write_staging() {
        let _ = fs::remove_file(&staging);
        return Err(io_error(&staging, e));
    }

    fs::rename(&staging, destination).map_err(|e| io_error(destination, e))
}

/// Reads a catalog previously written by [`save_catalog`].
///
/// Missing fields take their documented defaults.
pub fn load_catalog(source: &Path) -> Result<Catalog, CheckpointError> {
    let content = fs::read_to_string(source).map_err(|e| io_error(source, e))?;
    serde_json::from_str(&content).map_err(|e| CheckpointError::Json {
        path: source.to_path_buf(),
        source: e,
    })
}
