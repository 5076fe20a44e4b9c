//! `makemkvcon` driver.
//!
//! Builds robot-mode command lines and runs them as child processes that are
//! killed when the caller's cancellation token fires.

use super::robot::{parse_info_output, parse_messages};
use super::{DiscInfo, DiscTool, ToolError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// `iso:<path>` source specifier understood by makemkvcon.
fn iso_source(image: &Path) -> OsString {
    let mut source = OsString::from("iso:");
    source.push(image.as_os_str());
    source
}

/// Build the title listing command:
/// `makemkvcon -r --minlength=<secs> info iso:<image>`
pub fn build_info_command(binary: &str, image: &Path, min_length_secs: u32) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("-r");
    cmd.arg(format!("--minlength={}", min_length_secs));
    cmd.arg("info");
    cmd.arg(iso_source(image));
    cmd
}

/// Build the remux command:
/// `makemkvcon -r --minlength=<secs> mkv iso:<image> <title> <destination>`
pub fn build_mkv_command(
    binary: &str,
    image: &Path,
    title_index: u32,
    destination: &Path,
    min_length_secs: u32,
) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("-r");
    cmd.arg(format!("--minlength={}", min_length_secs));
    cmd.arg("mkv");
    cmd.arg(iso_source(image));
    cmd.arg(title_index.to_string());
    cmd.arg(destination);
    cmd
}

/// Runs `cmd` to completion, collecting stdout and stderr.
///
/// If `cancel` fires first the child is killed and reaped before
/// [`ToolError::Cancelled`] is returned.
pub async fn run_cancellable(cmd: Command, cancel: &CancellationToken) -> Result<Output, ToolError> {
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(buf)
    });

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            child.kill().await?;
            return Err(ToolError::Cancelled);
        }
    };

    let stdout = stdout_task.await.map_err(io::Error::other)??;
    let stderr = stderr_task.await.map_err(io::Error::other)??;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Maps a finished process to an error unless it exited successfully.
fn check_status(tool: &str, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        return Ok(());
    }

    match output.status.code() {
        Some(code) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = parse_messages(&stdout)
                .pop()
                .unwrap_or_else(|| String::from_utf8_lossy(&output.stderr).trim().to_string());
            Err(ToolError::Failed {
                tool: tool.to_string(),
                code,
                message,
            })
        }
        None => Err(ToolError::Terminated(tool.to_string())),
    }
}

/// [`DiscTool`] backed by the `makemkvcon` command-line tool.
#[derive(Debug, Clone)]
pub struct MakeMkv {
    binary: String,
}

impl MakeMkv {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for MakeMkv {
    fn default() -> Self {
        Self::new("makemkvcon")
    }
}

#[async_trait]
impl DiscTool for MakeMkv {
    async fn inspect(
        &self,
        image: &Path,
        min_length_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<DiscInfo, ToolError> {
        let cmd = build_info_command(&self.binary, image, min_length_secs);
        debug!(command = ?cmd, "listing titles");

        let output = run_cancellable(cmd, cancel).await?;
        check_status(&self.binary, &output)?;
        parse_info_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn remux(
        &self,
        image: &Path,
        title_index: u32,
        destination: &Path,
        min_length_secs: u32,
        cancel: &CancellationToken,
    ) -> Result<(), ToolError> {
        let cmd = build_mkv_command(
            &self.binary,
            image,
            title_index,
            destination,
            min_length_secs,
        );
        debug!(command = ?cmd, "remuxing title");

        let output = run_cancellable(cmd, cancel).await?;
        check_status(&self.binary, &output)
    }
}
