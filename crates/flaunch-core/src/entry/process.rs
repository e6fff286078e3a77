//! Helpers to run the desktop programs entries delegate to.

use crate::{LaunchError, Result};
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Run `program` to completion and return its exit status.
pub(crate) async fn run_to_exit<I, S>(program: &str, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!("Running {}", program);
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| LaunchError::LaunchFailed {
            entry: program.to_string(),
            message: format!("Failed to start: {}", e),
        })
}

/// Run `program` to completion, failing on a non-zero exit.
pub(crate) async fn run_checked<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let status = run_to_exit(program, args).await?;
    if status.success() {
        Ok(())
    } else {
        Err(exit_failure(program, status))
    }
}

/// Start `program` without waiting for it.
pub(crate) fn spawn_detached<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!("Spawning {}", program);
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .map(|_child| ())
        .map_err(|e| LaunchError::LaunchFailed {
            entry: program.to_string(),
            message: format!("Failed to start: {}", e),
        })
}

pub(crate) fn exit_failure(program: &str, status: ExitStatus) -> LaunchError {
    LaunchError::LaunchFailed {
        entry: program.to_string(),
        message: match status.code() {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by a signal".to_string(),
        },
    }
}
