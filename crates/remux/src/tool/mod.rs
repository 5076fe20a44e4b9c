//! Disc tool seam.
//!
//! Title enumeration and remux execution are delegated to an external tool.
//! [`DiscTool`] is the call/response contract the pipeline depends on;
//! [`MakeMkv`] drives `makemkvcon` in robot mode.

pub mod makemkv;
pub mod robot;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use makemkv::{build_info_command, build_mkv_command, MakeMkv};
pub use robot::{parse_info_output, parse_makemkv_version};

/// Errors reported by a disc tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool exited with a non-zero status.
    #[error("{tool} failed with exit code {code}: {message}")]
    Failed {
        tool: String,
        code: i32,
        message: String,
    },

    /// The tool was terminated by a signal.
    #[error("{0} was terminated by signal")]
    Terminated(String),

    /// The tool output could not be understood.
    #[error("Failed to parse tool output: {0}")]
    Parse(String),

    /// The invocation was cancelled and the subprocess killed.
    #[error("Tool invocation was cancelled")]
    Cancelled,

    /// IO error spawning or talking to the tool.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the tool reports about one title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleInfo {
    pub index: u32,
    pub chapter_count: Option<u32>,
    pub size: u64,
    pub name: Option<String>,
    pub source_filename: String,
    pub information: String,
    pub file_output: String,
    pub length: String,
}

/// Result of inspecting one disc image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscInfo {
    /// Disc name from the image metadata, when reported.
    pub name: Option<String>,
    /// Titles in enumeration order.
    pub titles: Vec<TitleInfo>,
}

/// Contract for the external disc inspection/remux tool.
///
/// Both calls must stop the underlying work and return
/// [`ToolError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait DiscTool: Send + Sync {
    /// Enumerate titles at least `min_length_secs` long.
    async fn inspect(
        &self,
        image: &Path,
        min_length_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<DiscInfo, ToolError>;

    /// Write title `title_index` of `image` as a file under `destination`.
    async fn remux(
        &self,
        image: &Path,
        title_index: u32,
        destination: &Path,
        min_length_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError>;
}
