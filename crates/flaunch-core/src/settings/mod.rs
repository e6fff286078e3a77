//! Persistent launcher settings.
//!
//! The configuration is a single JSON file shared by the picker, the remote
//! server and the CLI, which may all run at the same time. Every load and save
//! takes an advisory exclusive lock on a sidecar `config.json.lock` file, and
//! a save only rewrites the file when the in-memory copy differs from what is
//! on disk.
//!
//! Backends and providers keep their own settings as JSON objects under
//! `remotes-configs` and `providers-config`; [`Config::section_or_default`]
//! decodes one of those objects and persists a defaulted one when absent.

pub mod atomic;

pub use atomic::{atomic_read_json, atomic_write_json};

use crate::config::ConfigPaths;
use crate::{LaunchError, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A JSON object holding the settings of one backend or provider.
pub type Section = Map<String, Value>;

/// Which table of the configuration a section lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionTable {
    Remotes,
    Providers,
}

/// Launcher configuration, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the fzf executable.
    #[serde(rename = "fzf-path", default)]
    pub fzf_path: String,

    /// Log file, empty to log to stderr.
    #[serde(rename = "log-file", default)]
    pub log_file: String,

    /// Key of the remote backend to use (`http` or `rpc`).
    #[serde(rename = "selected-remote", default)]
    pub selected_remote: String,

    /// Settings of every backend, by backend key.
    #[serde(rename = "remotes-configs", default)]
    pub remotes: BTreeMap<String, Section>,

    /// Providers listed here are not built.
    #[serde(rename = "providers-blacklist", default)]
    pub blacklist: Vec<String>,

    /// Settings of every provider, by provider key.
    #[serde(rename = "providers-config", default)]
    pub providers: BTreeMap<String, Section>,

    /// Path of the backing file, not saved.
    #[serde(skip)]
    path: PathBuf,
}

/// Exclusive advisory lock on the configuration, released on drop.
struct ConfigLock {
    file: File,
}

impl ConfigLock {
    fn acquire(config_path: &Path) -> Result<Self> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| LaunchError::Io {
                message: "Unable to create config directory".to_string(),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let lock_path = lock_path(config_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| LaunchError::io_with_path(e, &lock_path))?;

        FileExt::lock_exclusive(&file).map_err(|e| LaunchError::io_with_path(e, &lock_path))?;

        Ok(Self { file })
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(config_path: &Path) -> PathBuf {
    let mut name = config_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(ConfigPaths::LOCK_SUFFIX);
    config_path.with_file_name(name)
}

impl Config {
    /// Default location: `<config_dir>/flaunch/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| LaunchError::Config {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir
            .join(ConfigPaths::APP_DIR_NAME)
            .join(ConfigPaths::CONFIG_FILE_NAME))
    }

    /// Load the configuration from its default location.
    pub fn load() -> Result<Self> {
        Self::load_at(Self::default_path()?)
    }

    /// Load the configuration at `path`, creating it when missing and
    /// persisting any default that had to be filled in.
    pub fn load_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let _lock = ConfigLock::acquire(&path)?;

        let mut config = Self::read_locked(&path)?.unwrap_or_default();
        config.path = path;
        config.fill_defaults();
        config.save_if_changed()?;

        Ok(config)
    }

    /// Persist the configuration if it differs from the file on disk.
    pub fn save(&self) -> Result<()> {
        let _lock = ConfigLock::acquire(&self.path)?;
        self.save_if_changed()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_locked(path: &Path) -> Result<Option<Self>> {
        atomic_read_json(path)
    }

    /// Must be called with the lock held.
    fn save_if_changed(&self) -> Result<()> {
        if let Some(mut latest) = Self::read_locked(&self.path)? {
            latest.path = self.path.clone();
            if latest == *self {
                return Ok(());
            }
        }

        debug!("Saving configuration to {}", self.path.display());
        atomic_write_json(&self.path, self)
    }

    fn fill_defaults(&mut self) {
        if self.fzf_path.is_empty() {
            self.fzf_path = "fzf".to_string();
        }
    }

    fn table(&self, table: SectionTable) -> &BTreeMap<String, Section> {
        match table {
            SectionTable::Remotes => &self.remotes,
            SectionTable::Providers => &self.providers,
        }
    }

    fn table_mut(&mut self, table: SectionTable) -> &mut BTreeMap<String, Section> {
        match table {
            SectionTable::Remotes => &mut self.remotes,
            SectionTable::Providers => &mut self.providers,
        }
    }

    /// Decode the section `key` of `table`, `None` only when the key is
    /// missing. An empty object is a section with nothing in it.
    pub fn section<T: DeserializeOwned>(&self, table: SectionTable, key: &str) -> Result<Option<T>> {
        let Some(section) = self.table(table).get(key) else {
            return Ok(None);
        };
        let value = serde_json::from_value(Value::Object(section.clone())).map_err(|e| {
            LaunchError::Config {
                message: format!("Invalid settings for {}: {}", key, e),
            }
        })?;
        Ok(Some(value))
    }

    /// Replace the section `key` of `table` and save the configuration.
    pub fn set_section<T: Serialize>(&mut self, table: SectionTable, key: &str, value: &T) -> Result<()> {
        let section = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            other => {
                return Err(LaunchError::Config {
                    message: format!("Settings for {} must be a JSON object, got {}", key, other),
                })
            }
        };
        self.table_mut(table).insert(key.to_string(), section);
        self.save()
    }

    /// Decode the section `key` of `table`, or store and persist `default()`
    /// when the section is absent.
    pub fn section_or_default<T, F>(&mut self, table: SectionTable, key: &str, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.section(table, key)? {
            return Ok(value);
        }

        let value = default();
        self.set_section(table, key, &value)?;
        Ok(value)
    }
}
