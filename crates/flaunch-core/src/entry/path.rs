use super::process::{exit_failure, run_to_exit, spawn_detached};
use super::{Entry, EntryOptions, EntryProvider, EntryVariant, ProviderKeys};
use crate::frontend::{FzfKey, OPTION_FZF_KEY};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Option overriding the provider's base directory.
pub const OPTION_BASE_DIRECTORY: &str = "base-directory";
/// Option hiding regular files from the listing.
pub const OPTION_HIDE_FILES: &str = "hide-files";
/// Option hiding directories from the listing.
pub const OPTION_HIDE_FOLDERS: &str = "hide-folders";
/// Option making the listing honor VCS ignore files.
pub const OPTION_IGNORE_VCS: &str = "ignore-vcs";

// xdg-open: "file not found" and "no application to open it"
const XDG_OPEN_RETRY_CODES: [i32; 2] = [3, 4];

/// An absolute path on disk, opened with the desktop's default application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathEntry(PathBuf);

impl PathEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    fn parent(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }

    async fn open_parent(&self) -> Result<()> {
        let parent = self.parent();
        let status = run_to_exit("xdg-open", [parent]).await?;
        if status.success() {
            Ok(())
        } else {
            Err(exit_failure("xdg-open", status))
        }
    }

    async fn open_in_terminal(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.0)
            .await
            .map_err(|e| LaunchError::io_with_path(e, &self.0))?;
        let directory = if metadata.is_dir() {
            self.0.as_path()
        } else {
            self.parent()
        };
        spawn_detached(
            "x-terminal-emulator",
            [Path::new("--working-directory"), directory],
        )
    }
}

#[async_trait]
impl Entry for PathEntry {
    async fn launch_local(&self, _config: &mut Config, _options: &mut EntryOptions) -> Result<()> {
        Err(LaunchError::RemoteRequired)
    }

    async fn launch_remote(&self, options: &EntryOptions) -> Result<()> {
        let mut key = options.get(OPTION_FZF_KEY).map(String::as_str).unwrap_or("");

        if key.is_empty() {
            let status = run_to_exit("xdg-open", [&self.0]).await?;
            match status.code() {
                Some(code) if XDG_OPEN_RETRY_CODES.contains(&code) => {
                    debug!(
                        "xdg-open exited with {} for {}, opening parent",
                        code,
                        self.0.display()
                    );
                    key = FzfKey::CTRL_P;
                }
                _ if status.success() => return Ok(()),
                _ => return Err(exit_failure("xdg-open", status)),
            }
        }

        match key {
            FzfKey::CTRL_P => self.open_parent().await,
            FzfKey::CTRL_N => spawn_detached("nautilus", [&self.0]),
            FzfKey::CTRL_T => self.open_in_terminal().await,
            other => Err(LaunchError::KeyNotHandled(other.to_string())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for PathEntry {}

/// Settings of the path provider, stored under `providers-config.path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathProviderSettings {
    #[serde(rename = "fdfind-path", default)]
    pub fdfind_path: String,
    #[serde(rename = "base-directory", default)]
    pub base_directory: String,
    #[serde(rename = "no-ignore-vcs", default)]
    pub no_ignore_vcs: bool,
    #[serde(rename = "hide-files", default)]
    pub hide_files: bool,
    #[serde(rename = "hide-folders", default)]
    pub hide_folders: bool,
}

impl Default for PathProviderSettings {
    fn default() -> Self {
        Self {
            fdfind_path: "fdfind".to_string(),
            base_directory: String::new(),
            no_ignore_vcs: true,
            hide_files: false,
            hide_folders: false,
        }
    }
}

impl PathProviderSettings {
    /// Apply the launch options on top of the stored settings.
    fn apply_options(&mut self, options: &EntryOptions) {
        if let Some(base_directory) = options.get(OPTION_BASE_DIRECTORY) {
            self.base_directory = base_directory.clone();
        }
        if is_set(options, OPTION_IGNORE_VCS) {
            self.no_ignore_vcs = false;
        }
        if is_set(options, OPTION_HIDE_FILES) {
            self.hide_files = true;
        }
        if is_set(options, OPTION_HIDE_FOLDERS) {
            self.hide_folders = true;
        }
    }

    /// Fill defaults and check the settings are usable.
    pub fn validate(&mut self) -> Result<()> {
        if self.fdfind_path.is_empty() {
            self.fdfind_path = Self::default().fdfind_path;
        }

        if self.base_directory.is_empty() {
            let home = dirs::home_dir().ok_or_else(|| LaunchError::Validation {
                field: "base-directory".to_string(),
                message: "Could not resolve the home directory".to_string(),
            })?;
            self.base_directory = home.to_string_lossy().into_owned();
        }

        if !Path::new(&self.base_directory).is_absolute() {
            return Err(LaunchError::Validation {
                field: "base-directory".to_string(),
                message: format!("must be an absolute path, got {:?}", self.base_directory),
            });
        }

        if self.hide_files && self.hide_folders {
            return Err(LaunchError::Validation {
                field: "hide-files".to_string(),
                message: "cannot hide both files and folders".to_string(),
            });
        }

        Ok(())
    }

    fn fdfind_args(&self) -> Vec<&str> {
        let mut args = vec![
            "--base-directory",
            self.base_directory.as_str(),
            "--relative-path",
            "--strip-cwd-prefix",
        ];
        if self.no_ignore_vcs {
            args.push("--no-ignore-vcs");
        }
        if self.hide_files {
            args.extend(["--type", "d"]);
        }
        if self.hide_folders {
            args.extend(["--type", "f"]);
        }
        args
    }
}

fn is_set(options: &EntryOptions, key: &str) -> bool {
    options.get(key).is_some_and(|v| v == "true")
}

/// Lists the files below a base directory with `fdfind`.
#[derive(Debug, Clone)]
pub struct PathProvider {
    settings: PathProviderSettings,
}

impl PathProvider {
    pub fn new(config: &mut Config, options: &EntryOptions) -> Result<Self> {
        let mut settings: PathProviderSettings = config.section_or_default(
            SectionTable::Providers,
            ProviderKeys::PATH,
            PathProviderSettings::default,
        )?;
        settings.apply_options(options);
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &PathProviderSettings {
        &self.settings
    }
}

#[async_trait]
impl EntryProvider for PathProvider {
    async fn entry_keys(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.settings.fdfind_path)
            .args(self.settings.fdfind_args())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| LaunchError::LaunchFailed {
                entry: self.settings.fdfind_path.clone(),
                message: format!("Failed to start: {}", e),
            })?;

        if !output.status.success() {
            warn!(
                "{} exited with {}, listing may be incomplete",
                self.settings.fdfind_path, output.status
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn fetch(&self, key: &str) -> Option<Box<dyn Entry>> {
        let path = Path::new(&self.settings.base_directory).join(key);
        if path.exists() {
            Some(Box::new(PathEntry::new(path)))
        } else {
            None
        }
    }
}
