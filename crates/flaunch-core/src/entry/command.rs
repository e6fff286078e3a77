use super::map_provider::merge_into_section;
use super::{Entry, EntryOptions, EntryVariant, MapProvider, ProviderKeys};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const COMMAND_PREFIX: &str = "$ ";

/// A program run in the picker's terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds to keep the terminal open after a successful run.
    #[serde(default)]
    pub second_delay: u64,
    /// Close immediately when the program fails instead of waiting for Ctrl-C.
    #[serde(default)]
    pub close_on_failure: bool,
}

enum RunOutcome {
    Finished(Result<()>),
    Interrupted,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            second_delay: 0,
            close_on_failure: false,
        }
    }

    pub fn with_delay(mut self, seconds: u64) -> Self {
        self.second_delay = seconds;
        self
    }

    pub fn with_close_on_failure(mut self, close_on_failure: bool) -> Self {
        self.close_on_failure = close_on_failure;
        self
    }

    fn defaults() -> HashMap<String, CommandEntry> {
        HashMap::from([(
            "<ping".to_string(),
            CommandEntry::new(
                "/usr/bin/ping",
                ["-i", "0.2", "1.1", "-c", "5"].map(String::from).to_vec(),
            )
            .with_delay(5)
            .with_close_on_failure(true),
        )])
    }

    /// Provider over the commands stored in the configuration.
    pub fn provider(config: &mut Config) -> Result<MapProvider<CommandEntry>> {
        let commands = config.section_or_default(
            SectionTable::Providers,
            ProviderKeys::COMMANDS,
            Self::defaults,
        )?;
        Ok(MapProvider::new(commands, COMMAND_PREFIX))
    }

    /// Run the program attached to the terminal, killing it on Ctrl-C.
    async fn run_attached(&self) -> RunOutcome {
        let mut child = match Command::new(&self.name)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::Finished(Err(LaunchError::LaunchFailed {
                    entry: self.name.clone(),
                    message: format!("Failed to start: {}", e),
                }))
            }
        };

        tokio::select! {
            status = child.wait() => RunOutcome::Finished(match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(super::process::exit_failure(&self.name, status)),
                Err(e) => Err(LaunchError::io_with_path(e, &self.name)),
            }),
            _ = tokio::signal::ctrl_c() => RunOutcome::Interrupted,
        }
    }
}

#[async_trait]
impl Entry for CommandEntry {
    async fn launch_local(&self, _config: &mut Config, _options: &mut EntryOptions) -> Result<()> {
        info!("Running {} {:?}", self.name, self.args);

        let failure = match self.run_attached().await {
            RunOutcome::Finished(Ok(())) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(self.second_delay)) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return Ok(());
            }
            RunOutcome::Finished(Err(e)) => {
                if self.close_on_failure {
                    debug!("{} failed, closing: {}", self.name, e);
                    return Ok(());
                }
                // keep the output visible until the user dismisses it
                let _ = tokio::signal::ctrl_c().await;
                e
            }
            RunOutcome::Interrupted => LaunchError::LaunchFailed {
                entry: self.name.clone(),
                message: "interrupted".to_string(),
            },
        };

        if self.close_on_failure {
            Ok(())
        } else {
            Err(failure)
        }
    }

    async fn launch_remote(&self, _options: &EntryOptions) -> Result<()> {
        Err(LaunchError::RemoteLaunchUnsupported(self.name.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for CommandEntry {}

/// Add commands to the configuration, refusing existing names unless
/// `overwrite` is set.
pub fn add_commands_to_config(
    config: &mut Config,
    commands: HashMap<String, CommandEntry>,
    overwrite: bool,
) -> Result<()> {
    merge_into_section(config, ProviderKeys::COMMANDS, commands, overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryProvider;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> Config {
        Config::load_at(temp_dir.path().join("config.json")).unwrap()
    }

    #[tokio::test]
    async fn test_default_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);

        let provider = CommandEntry::provider(&mut config).unwrap();
        assert_eq!(provider.entry_keys().await.unwrap(), vec!["$ <ping".to_string()]);

        let entry = provider.fetch("$ <ping").unwrap();
        let command = entry.as_any().downcast_ref::<CommandEntry>().unwrap();
        assert_eq!(command.name, "/usr/bin/ping");
        assert_eq!(command.second_delay, 5);
        assert!(command.close_on_failure);
    }

    #[test]
    fn test_add_commands_detects_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        CommandEntry::provider(&mut config).unwrap();

        let duplicate = HashMap::from([("<ping".to_string(), CommandEntry::new("ping", vec![]))]);
        let result = add_commands_to_config(&mut config, duplicate.clone(), false);
        assert!(matches!(result, Err(LaunchError::Validation { .. })));

        add_commands_to_config(&mut config, duplicate, true).unwrap();
        let htop = HashMap::from([("htop".to_string(), CommandEntry::new("htop", vec![]))]);
        add_commands_to_config(&mut config, htop, false).unwrap();

        let stored: HashMap<String, CommandEntry> = Config::load_at(config.path())
            .unwrap()
            .section(SectionTable::Providers, ProviderKeys::COMMANDS)
            .unwrap()
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["<ping"].name, "ping");
    }

    #[test]
    fn test_missing_fields_default() {
        let command: CommandEntry = serde_json::from_str(r#"{"name": "top"}"#).unwrap();
        assert_eq!(command, CommandEntry::new("top", vec![]));
    }

    #[tokio::test]
    async fn test_remote_launch_is_unsupported() {
        let result = CommandEntry::new("top", vec![])
            .launch_remote(&EntryOptions::new())
            .await;
        assert!(matches!(result, Err(LaunchError::RemoteLaunchUnsupported(name)) if name == "top"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_closes_when_requested() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        let command = CommandEntry::new("false", vec![]).with_close_on_failure(true);
        command
            .launch_local(&mut config, &mut EntryOptions::new())
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_delay() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        let command = CommandEntry::new("true", vec![]);
        command
            .launch_local(&mut config, &mut EntryOptions::new())
            .await
            .unwrap();
    }
}
