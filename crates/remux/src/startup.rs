//! Preflight checks run before any disc is touched.
//!
//! `makemkvcon` has no `--version` flag. Started without arguments it prints
//! its banner and usage, which is enough to prove the binary can be executed.

use crate::tool::parse_makemkv_version;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("makemkvcon not available: {0}")]
    MakeMkvUnavailable(String),
}

/// Check that the disc tool at `binary` can be started
///
/// Returns the version reported in its banner when one could be parsed.
/// The exit status is ignored since the usage screen exits non-zero.
pub async fn check_makemkvcon_available(binary: &str) -> Result<Option<String>, StartupError> {
    let output = Command::new(binary)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            StartupError::MakeMkvUnavailable(format!(
                "failed to run '{}'; is MakeMKV installed and in PATH? Error: {}",
                binary, e
            ))
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(parse_makemkv_version(&text))
}
