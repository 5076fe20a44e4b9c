//! Remux orchestrator.
//!
//! Walks the catalog strictly in order, one disc at a time:
//!
//! ```text
//! PENDING (processed = false) -> REMUXING -> DONE (processed = true)
//! ```
//!
//! Discs already marked processed are skipped, so a resumed run only touches
//! the remaining work. On cancellation the in-flight tool process is killed and
//! the whole catalog is written to the checkpoint file before returning.

use crate::catalog::{Catalog, Disc};
use crate::checkpoint::{save_catalog, CheckpointError};
use crate::tool::{DiscTool, ToolError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Error type for the remux pass
#[derive(Debug, Error)]
pub enum RemuxError {
    /// The operator interrupted the pass; progress was written to `checkpoint`
    #[error("Remux interrupted; load {} to continue", checkpoint.display())]
    Interrupted { checkpoint: PathBuf },

    /// The disc tool failed for one disc
    #[error("Remux of {} failed: {source}", path.display())]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    /// The output directory for a disc could not be created
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the checkpoint failed
    #[error("Failed to write checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Settings for one remux pass
#[derive(Debug, Clone, PartialEq)]
pub struct RemuxSettings {
    /// Root under which one folder per disc is created
    pub output_root: PathBuf,
    /// Where the catalog is written when the pass stops early
    pub checkpoint_path: PathBuf,
    /// Passed through to the tool
    pub min_length_secs: u32,
    /// Log and continue after a failed remux instead of stopping
    pub continue_on_error: bool,
    /// When non-empty, only discs matching one of these names are remuxed
    pub filter: Vec<String>,
}

impl RemuxSettings {
    pub fn new(output_root: impl Into<PathBuf>, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            checkpoint_path: checkpoint_path.into(),
            min_length_secs: 1200,
            continue_on_error: false,
            filter: Vec::new(),
        }
    }
}

/// Counters for one remux pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemuxReport {
    pub remuxed: usize,
    pub already_processed: usize,
    pub unprocessable: usize,
    pub filtered_out: usize,
    pub failed: usize,
}

/// Sequential remux driver. Holds no catalog state of its own; the catalog
/// is borrowed mutably for the duration of [`RemuxOrchestrator::run`].
pub struct RemuxOrchestrator {
    tool: Arc<dyn DiscTool>,
    settings: RemuxSettings,
}

impl RemuxOrchestrator {
    pub fn new(tool: Arc<dyn DiscTool>, settings: RemuxSettings) -> Self {
        Self { tool, settings }
    }

    pub fn settings(&self) -> &RemuxSettings {
        &self.settings
    }

    /// Output directory for a disc: `<output_root>/<folder holding the image>`.
    ///
    /// Images sitting directly under a filesystem root fall back to the image
    /// file stem.
    pub fn destination_for(&self, disc: &Disc) -> PathBuf {
        let folder = disc
            .folder_name()
            .map(str::to_string)
            .or_else(|| {
                disc.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        self.settings.output_root.join(folder)
    }

    /// Whether the name filter selects `disc`. Matches the display title, the
    /// folder name or the image file stem, ignoring case.
    pub fn matches_filter(&self, disc: &Disc) -> bool {
        if self.settings.filter.is_empty() {
            return true;
        }
        let stem = disc.path.file_stem().and_then(|s| s.to_str());
        let candidates = [Some(disc.title.as_str()), disc.folder_name(), stem];
        self.settings.filter.iter().any(|wanted| {
            candidates
                .iter()
                .flatten()
                .any(|name| !name.is_empty() && name.eq_ignore_ascii_case(wanted))
        })
    }

    /// Remuxes every pending disc in catalog order.
    pub async fn run(
        &self,
        catalog: &mut Catalog,
        cancel: &CancellationToken,
    ) -> Result<RemuxReport, RemuxError> {
        let mut report = RemuxReport::default();
        let total = catalog.len();

        for position in 0..total {
            if cancel.is_cancelled() {
                return Err(self.interrupt(catalog));
            }

            let disc = &catalog[position];
            if disc.processed {
                report.already_processed += 1;
                continue;
            }
            if !self.matches_filter(disc) {
                report.filtered_out += 1;
                continue;
            }
            let Some(title_index) = disc
                .main_feature()
                .and_then(|t| u32::try_from(t.index).ok())
            else {
                warn!(path = %disc.path.display(), "no main feature recorded, skipping disc");
                report.unprocessable += 1;
                continue;
            };

            let image = disc.path.clone();
            let label = disc.label();
            let destination = self.destination_for(disc);
            info!(
                position = position + 1,
                total,
                disc = %label,
                title = title_index,
                destination = %destination.display(),
                "remuxing disc"
            );

            match self.remux_one(&image, title_index, &destination, cancel).await {
                Ok(()) => {
                    catalog[position].processed = true;
                    report.remuxed += 1;
                    info!(disc = %label, "disc done");
                }
                Err(RemuxError::Tool {
                    source: ToolError::Cancelled,
                    ..
                }) => return Err(self.interrupt(catalog)),
                Err(e) if self.settings.continue_on_error => {
                    warn!(disc = %label, error = %e, "remux failed, continuing");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(disc = %label, error = %e, "remux failed, stopping batch");
                    self.write_checkpoint(catalog)?;
                    return Err(e);
                }
            }
        }

        info!(
            remuxed = report.remuxed,
            skipped = report.already_processed,
            unprocessable = report.unprocessable,
            failed = report.failed,
            "remux pass finished"
        );
        Ok(report)
    }

    async fn remux_one(
        &self,
        image: &Path,
        title_index: u32,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RemuxError> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| RemuxError::OutputDir {
                path: destination.to_path_buf(),
                source,
            })?;

        self.tool
            .remux(
                image,
                title_index,
                destination,
                self.settings.min_length_secs,
                cancel,
            )
            .await
            .map_err(|source| RemuxError::Tool {
                path: image.to_path_buf(),
                source,
            })
    }

    fn write_checkpoint(&self, catalog: &Catalog) -> Result<(), RemuxError> {
        save_catalog(catalog, &self.settings.checkpoint_path)?;
        info!(checkpoint = %self.settings.checkpoint_path.display(), "checkpoint written");
        Ok(())
    }

    /// Final step of the interruption path: persist, then report where.
    fn interrupt(&self, catalog: &Catalog) -> RemuxError {
        if let Err(e) = self.write_checkpoint(catalog) {
            error!(error = %e, "could not write checkpoint after interruption");
            return e;
        }
        warn!(
            checkpoint = %self.settings.checkpoint_path.display(),
            "remux interrupted, load the checkpoint to continue"
        );
        RemuxError::Interrupted {
            checkpoint: self.settings.checkpoint_path.clone(),
        }
    }
}
