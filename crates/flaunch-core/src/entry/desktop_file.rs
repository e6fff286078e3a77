use super::process::run_checked;
use super::{Entry, EntryOptions, EntryVariant, MapProvider, ProviderKeys, OPTION_RESTART};
use crate::discovery::{ScanRequest, ScanStrategy};
use crate::frontend::{FzfKey, OPTION_FZF_KEY};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::info;

const DESKTOP_FILE_PREFIX: &str = "@ ";

/// A visible desktop application, launched with `gtk-launch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesktopFile {
    /// Display name, from the `Name` key.
    pub name: String,
    /// File name of the `.desktop` file.
    pub identifier: String,
}

/// Settings of the desktop-file provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopFileSettings {
    /// Identifiers never listed.
    #[serde(rename = "df-id-blacklist", default)]
    pub blacklist: Vec<String>,
}

impl DesktopFile {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
        }
    }

    /// Provider over the applications found in the XDG data directories.
    pub async fn provider(config: &mut Config) -> Result<MapProvider<DesktopFile>> {
        let settings: DesktopFileSettings = config.section_or_default(
            SectionTable::Providers,
            ProviderKeys::DESKTOP_FILES,
            DesktopFileSettings::default,
        )?;

        let request = ScanRequest::from_env(settings.blacklist);
        let desktop_files = ScanStrategy::default().scan(request).await?;
        Ok(MapProvider::new(desktop_files, DESKTOP_FILE_PREFIX))
    }

    fn blacklist(&self, config: &mut Config) -> Result<()> {
        let mut settings: DesktopFileSettings = config
            .section(SectionTable::Providers, ProviderKeys::DESKTOP_FILES)?
            .unwrap_or_default();
        if !settings.blacklist.contains(&self.identifier) {
            settings.blacklist.push(self.identifier.clone());
        }
        config.set_section(
            SectionTable::Providers,
            ProviderKeys::DESKTOP_FILES,
            &settings,
        )
    }
}

#[async_trait]
impl Entry for DesktopFile {
    async fn launch_local(&self, config: &mut Config, options: &mut EntryOptions) -> Result<()> {
        if options.get(OPTION_FZF_KEY).map(String::as_str) != Some(FzfKey::CTRL_D) {
            return Err(LaunchError::RemoteRequired);
        }

        info!("Hiding {} ({})", self.name, self.identifier);
        self.blacklist(config)?;
        options.insert(OPTION_RESTART.to_string(), "true".to_string());
        Ok(())
    }

    async fn launch_remote(&self, _options: &EntryOptions) -> Result<()> {
        run_checked("gtk-launch", [&self.identifier]).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for DesktopFile {}
