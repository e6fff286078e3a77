//! Selection frontend.
//!
//! The frontend receives the newline-delimited entry keys and returns the
//! selected key, optionally preceded by the modifier key used to accept it.

use crate::entry::process::exit_failure;
use crate::entry::EntryOptions;
use crate::settings::Config;
use crate::{LaunchError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// Option holding the modifier key that accepted the selection.
pub const OPTION_FZF_KEY: &str = "fzf-key";

/// Exit status of fzf when the user aborts (ESC, CTRL-C).
const FZF_EXIT_ABORTED: i32 = 130;

/// Modifier keys bound in fzf.
pub struct FzfKey;

impl FzfKey {
    pub const CTRL_T: &'static str = "ctrl-t";
    pub const CTRL_A: &'static str = "ctrl-a";
    pub const CTRL_P: &'static str = "ctrl-p";
    pub const CTRL_N: &'static str = "ctrl-n";
    pub const CTRL_D: &'static str = "ctrl-d";
    pub const CTRL_V: &'static str = "ctrl-v";

    pub const ALL: [&'static str; 6] = [
        Self::CTRL_T,
        Self::CTRL_A,
        Self::CTRL_P,
        Self::CTRL_N,
        Self::CTRL_D,
        Self::CTRL_V,
    ];
}

#[async_trait]
pub trait Frontend: Send {
    /// Start the frontend over `entries`.
    async fn start(&mut self, entries: Vec<String>, config: &Config) -> Result<()>;

    /// Wait for the user and return the selected key with its options.
    async fn selection(&mut self) -> Result<(String, EntryOptions)>;

    /// Whether entries may be launched in the frontend's process.
    fn allow_local_execution(&self) -> bool;
}

/// Frontend running `fzf`.
#[derive(Default)]
pub struct FzfFrontend {
    program: String,
    child: Option<Child>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
}

impl FzfFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    fn args() -> Vec<String> {
        let mut args = vec!["--multi".to_string()];
        for key in FzfKey::ALL {
            args.push("--bind".to_string());
            args.push(format!("{}:execute(echo {})+accept", key, key));
        }
        args
    }
}

#[async_trait]
impl Frontend for FzfFrontend {
    async fn start(&mut self, entries: Vec<String>, config: &Config) -> Result<()> {
        let mut child = Command::new(&config.fzf_path)
            .args(Self::args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::LaunchFailed {
                entry: config.fzf_path.clone(),
                message: format!("Failed to start: {}", e),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LaunchError::Other("fzf stdin is not piped".to_string()))?;

        debug!("Feeding {} entries to {}", entries.len(), config.fzf_path);
        self.feeder = Some(tokio::spawn(async move {
            let mut input = entries.join("\n");
            input.push('\n');
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        }));
        self.program = config.fzf_path.clone();
        self.child = Some(child);
        Ok(())
    }

    async fn selection(&mut self) -> Result<(String, EntryOptions)> {
        let child = self
            .child
            .take()
            .ok_or_else(|| LaunchError::Other("frontend was not started".to_string()))?;
        let output = child.wait_with_output().await?;

        // fzf stops reading once a key is accepted
        if let Some(feeder) = self.feeder.take() {
            match feeder.await {
                Ok(Err(e)) => debug!("Entry feed interrupted: {}", e),
                Err(e) => debug!("Entry feed task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }

        if output.status.code() == Some(FZF_EXIT_ABORTED) {
            return Err(LaunchError::NoEntrySelected);
        }
        if !output.status.success() {
            return Err(exit_failure(&self.program, output.status));
        }

        parse_selection(&String::from_utf8_lossy(&output.stdout))
    }

    fn allow_local_execution(&self) -> bool {
        true
    }
}

/// Parse `"key\n"` or `"modifier\nkey\n"`.
pub fn parse_selection(output: &str) -> Result<(String, EntryOptions)> {
    if output.is_empty() {
        return Err(LaunchError::NoEntrySelected);
    }

    let parts: Vec<&str> = output.split('\n').collect();
    match parts.as_slice() {
        [_] => Err(LaunchError::NoNewLine),
        [key, _] => Ok((key.to_string(), EntryOptions::new())),
        [modifier, key, _] => Ok((
            key.to_string(),
            EntryOptions::from([(OPTION_FZF_KEY.to_string(), modifier.to_string())]),
        )),
        _ => Err(LaunchError::BadSelection(format!(
            "expected at most two lines, got {}",
            parts.len() - 1
        ))),
    }
}
