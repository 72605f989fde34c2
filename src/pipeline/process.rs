//! External tool invocation with a timeout and cancellation.
//!
//! Every call spawns the child with `kill_on_drop(true)`: when the timeout
//! or the cancellation token wins the race, the pending wait future is
//! dropped and tokio kills the process instead of leaving a stuck `pdflatex`
//! behind.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest stderr tail kept in an [`ToolFailure::Exit`] message.
const STDERR_TAIL_CHARS: usize = 160;

/// Why a single tool invocation did not succeed.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The executable could not be started (usually: not installed).
    #[error("could not be started: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process ran and exited unsuccessfully.
    #[error("{status}{}", stderr_suffix(.stderr))]
    Exit { status: ExitStatus, stderr: String },

    /// The process exited cleanly but its expected output file is missing.
    #[error("exited cleanly but {} was not produced", .0.display())]
    MissingOutput(PathBuf),

    #[error("timed out after {0}s")]
    TimedOut(u64),

    #[error("cancelled")]
    Cancelled,
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Run `program args…` in `cwd` and wait for it to exit successfully.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    cwd: &Path,
    timeout_secs: u64,
    cancel: &CancellationToken,
) -> Result<Output, ToolFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if cancel.is_cancelled() {
        return Err(ToolFailure::Cancelled);
    }

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running {:?} in {}", cmd.as_std(), cwd.display());

    let child = cmd.spawn().map_err(ToolFailure::Spawn)?;

    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ToolFailure::Cancelled),
        waited = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()) => {
            match waited {
                Err(_) => return Err(ToolFailure::TimedOut(timeout_secs)),
                Ok(result) => result.map_err(ToolFailure::Spawn)?,
            }
        }
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolFailure::Exit {
            status: output.status,
            stderr: stderr_tail(&output.stderr),
        })
    }
}

/// The last [`STDERR_TAIL_CHARS`] characters of the trimmed stderr.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        text.to_string()
    } else {
        let tail: String = text.chars().skip(count - STDERR_TAIL_CHARS).collect();
        format!("…{tail}")
    }
}
