//! Title inspection and main-feature selection.
//!
//! A title counts as a main feature when it reports chapters and occupies more
//! than `size_cutoff` of the whole disc image. Several titles can qualify
//! (multi-cut editions); all of them are kept in enumeration order.

use crate::catalog::{clamp_size, Disc, Title};
use crate::tool::{DiscInfo, DiscTool, TitleInfo, ToolError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Error type for inspection. Tool failures are absorbed; only an interruption
/// escapes.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Inspection interrupted")]
    Interrupted,
}

/// Thresholds applied while inspecting a disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InspectSettings {
    /// Passed to the tool to drop menu loops and trailers.
    pub min_length_secs: u32,
    /// Fraction of the disc image a title must exceed.
    pub size_cutoff: f64,
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self {
            min_length_secs: 1200,
            size_cutoff: 0.5,
        }
    }
}

impl From<&crate::config::DiscoveryConfig> for InspectSettings {
    fn from(cfg: &crate::config::DiscoveryConfig) -> Self {
        Self {
            min_length_secs: cfg.min_length_secs,
            size_cutoff: cfg.size_cutoff,
        }
    }
}

/// Whether a title of `title_size` bytes is large enough to be the main
/// feature of a disc of `disc_size` bytes. Strictly greater than.
pub fn exceeds_size_cutoff(title_size: u64, disc_size: i64, size_cutoff: f64) -> bool {
    title_size as f64 > disc_size as f64 * size_cutoff
}

fn to_title(info: &TitleInfo) -> Title {
    Title {
        index: i32::try_from(info.index).unwrap_or(i32::MAX),
        source_file_name: info.source_filename.clone(),
        description: info.information.clone(),
        file_output: info.file_output.clone(),
        runtime: info.length.clone(),
        chapters: info
            .chapter_count
            .map(|c| i32::try_from(c).unwrap_or(i32::MAX))
            .unwrap_or(-1),
        size: clamp_size(info.size),
    }
}

/// Appends every qualifying title of `info` to `disc`.
///
/// Titles without chapters are skipped. The display title follows the last
/// qualifying title's name.
pub fn select_main_features(disc: &mut Disc, info: &DiscInfo, size_cutoff: f64) {
    for title in &info.titles {
        if matches!(title.chapter_count, None | Some(0)) {
            continue;
        }
        if exceeds_size_cutoff(title.size, disc.size, size_cutoff) {
            disc.title = title.name.clone().unwrap_or_default();
            disc.titles.push(to_title(title));
        }
    }
}

/// Inspects one disc image and returns it enriched with its main-feature
/// candidates.
///
/// A tool failure is logged and yields the disc with no candidates. A
/// cancellation kills the tool and returns [`InspectError::Interrupted`].
pub async fn inspect_disc(
    mut disc: Disc,
    tool: &dyn DiscTool,
    settings: InspectSettings,
    cancel: &CancellationToken,
) -> Result<Disc, InspectError> {
    info!(path = %disc.path.display(), "inspecting disc");

    match tool
        .inspect(&disc.path, settings.min_length_secs, cancel)
        .await
    {
        Ok(disc_info) => {
            select_main_features(&mut disc, &disc_info, settings.size_cutoff);
            if disc.is_unprocessable() {
                warn!(
                    path = %disc.path.display(),
                    titles = disc_info.titles.len(),
                    "no title qualifies as main feature"
                );
            } else {
                info!(
                    path = %disc.path.display(),
                    title = %disc.title,
                    candidates = disc.titles.len(),
                    "main feature selected"
                );
            }
            Ok(disc)
        }
        Err(ToolError::Cancelled) => Err(InspectError::Interrupted),
        Err(e) => {
            warn!(path = %disc.path.display(), error = %e, "inspection failed, skipping disc");
            Ok(disc)
        }
    }
}
