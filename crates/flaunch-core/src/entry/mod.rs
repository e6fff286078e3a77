//! Launchable entries and the providers that list them.
//!
//! An [`Entry`] is anything the picker can launch: a path, a command, a
//! shortcut or a desktop application. Entries are first launched in the
//! picker's own process with [`Entry::launch_local`]; an entry answering
//! [`LaunchError::RemoteRequired`] is encoded through the [`EntryRegistry`]
//! and forwarded to a remote, which decodes it and calls
//! [`Entry::launch_remote`].
//!
//! An [`EntryProvider`] lists the keys shown in the picker and resolves a
//! selected key back to an entry.

mod command;
mod desktop_file;
mod map_provider;
mod path;
pub(crate) mod process;
pub mod registry;
mod shortcut;

pub use command::{add_commands_to_config, CommandEntry};
pub use desktop_file::{DesktopFile, DesktopFileSettings};
pub use map_provider::MapProvider;
pub use path::{
    PathEntry, PathProvider, PathProviderSettings, OPTION_BASE_DIRECTORY, OPTION_HIDE_FILES,
    OPTION_HIDE_FOLDERS, OPTION_IGNORE_VCS,
};
pub use registry::{Envelope, EntryRegistry, EntryVariant};
pub use shortcut::{add_shortcuts_to_config, ShortcutEntry};

use crate::settings::Config;
use crate::{LaunchError, Result};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Free-form options attached to a launch (modifier key, base directory, ...).
pub type EntryOptions = HashMap<String, String>;

/// Option set by an entry when the picker should be restarted.
pub const OPTION_RESTART: &str = "restart";

/// A launchable unit.
#[async_trait]
pub trait Entry: fmt::Debug + Send + Sync + 'static {
    /// Launch the entry in the calling process.
    ///
    /// Returns [`LaunchError::RemoteRequired`] when the entry has to be
    /// forwarded to a remote instead.
    async fn launch_local(&self, config: &mut Config, options: &mut EntryOptions) -> Result<()>;

    /// Launch the entry inside the remote process.
    async fn launch_remote(&self, options: &EntryOptions) -> Result<()>;

    /// Runtime identity of the variant, used by the registry.
    fn as_any(&self) -> &dyn Any;
}

/// A source of entries for the picker.
#[async_trait]
pub trait EntryProvider: Send + Sync {
    /// Keys shown in the picker, already prefixed.
    async fn entry_keys(&self) -> Result<Vec<String>>;

    /// Resolve a (prefixed) key back to an entry.
    fn fetch(&self, key: &str) -> Option<Box<dyn Entry>>;
}

/// Provider keys, in the order their entries are listed.
pub struct ProviderKeys;

impl ProviderKeys {
    pub const COMMANDS: &'static str = "commands";
    pub const SHORTCUTS: &'static str = "shortcuts";
    pub const DESKTOP_FILES: &'static str = "desktop-files";
    pub const PATH: &'static str = "path";

    pub const ALL: [&'static str; 4] = [
        Self::COMMANDS,
        Self::SHORTCUTS,
        Self::DESKTOP_FILES,
        Self::PATH,
    ];
}

/// Build a single provider by key.
pub async fn build_provider(
    key: &str,
    config: &mut Config,
    options: &EntryOptions,
) -> Result<Box<dyn EntryProvider>> {
    let provider: Box<dyn EntryProvider> = match key {
        ProviderKeys::COMMANDS => Box::new(CommandEntry::provider(config)?),
        ProviderKeys::SHORTCUTS => Box::new(ShortcutEntry::provider(config)?),
        ProviderKeys::DESKTOP_FILES => Box::new(DesktopFile::provider(config).await?),
        ProviderKeys::PATH => Box::new(PathProvider::new(config, options)?),
        other => {
            return Err(LaunchError::Config {
                message: format!("Unknown provider: {}", other),
            })
        }
    };
    Ok(provider)
}

/// Build every provider that is not blacklisted in the configuration.
pub async fn build_providers(
    config: &mut Config,
    options: &EntryOptions,
) -> Result<Vec<Box<dyn EntryProvider>>> {
    let mut providers = Vec::with_capacity(ProviderKeys::ALL.len());

    for key in ProviderKeys::ALL {
        if config.blacklist.iter().any(|b| b == key) {
            debug!("Provider {} is blacklisted", key);
            continue;
        }
        providers.push(build_provider(key, config, options).await?);
    }

    Ok(providers)
}

/// Resolve a selected key through the first provider that knows it.
pub fn fetch_entry(providers: &[Box<dyn EntryProvider>], key: &str) -> Result<Box<dyn Entry>> {
    providers
        .iter()
        .find_map(|provider| provider.fetch(key))
        .ok_or(LaunchError::NotFound)
}
