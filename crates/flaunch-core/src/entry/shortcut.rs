use super::map_provider::merge_into_section;
use super::process::run_checked;
use super::{Entry, EntryOptions, EntryVariant, MapProvider, ProviderKeys};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

const SHORTCUT_PREFIX: &str = "🔗 ";
const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// A URI or an absolute path, opened with `xdg-open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortcutEntry(String);

impl ShortcutEntry {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn target(&self) -> &str {
        &self.0
    }

    /// Accept web and file URIs, and absolute paths.
    pub fn validate(&self) -> Result<()> {
        match Url::parse(&self.0) {
            Ok(url) if ALLOWED_SCHEMES.contains(&url.scheme()) => Ok(()),
            Ok(_) => Err(LaunchError::InvalidScheme(self.0.clone())),
            Err(_) if Path::new(&self.0).is_absolute() => Ok(()),
            Err(_) => Err(LaunchError::InvalidScheme(self.0.clone())),
        }
    }

    /// Provider over the shortcuts stored in the configuration.
    pub fn provider(config: &mut Config) -> Result<MapProvider<ShortcutEntry>> {
        let config_file = config.path().to_string_lossy().into_owned();
        let shortcuts: HashMap<String, ShortcutEntry> = config.section_or_default(
            SectionTable::Providers,
            ProviderKeys::SHORTCUTS,
            || HashMap::from([("config".to_string(), ShortcutEntry::new(config_file))]),
        )?;

        for shortcut in shortcuts.values() {
            shortcut.validate()?;
        }

        Ok(MapProvider::new(shortcuts, SHORTCUT_PREFIX))
    }
}

#[async_trait]
impl Entry for ShortcutEntry {
    async fn launch_local(&self, _config: &mut Config, _options: &mut EntryOptions) -> Result<()> {
        Err(LaunchError::RemoteRequired)
    }

    async fn launch_remote(&self, _options: &EntryOptions) -> Result<()> {
        run_checked("xdg-open", [&self.0]).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for ShortcutEntry {}

/// Add shortcuts to the configuration, refusing existing names unless
/// `overwrite` is set. Every shortcut is validated first.
pub fn add_shortcuts_to_config(
    config: &mut Config,
    shortcuts: HashMap<String, ShortcutEntry>,
    overwrite: bool,
) -> Result<()> {
    for shortcut in shortcuts.values() {
        shortcut.validate()?;
    }
    merge_into_section(config, ProviderKeys::SHORTCUTS, shortcuts, overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryProvider;
    use tempfile::TempDir;

    #[test]
    fn test_validate() {
        for ok in [
            "https://docs.rs",
            "http://localhost:8080/x",
            "file:///etc/hosts",
            "/home/user/notes.md",
        ] {
            assert!(ShortcutEntry::new(ok).validate().is_ok(), "{}", ok);
        }
        for bad in ["ftp://example.com", "javascript:alert(1)", "relative/path"] {
            assert!(
                matches!(
                    ShortcutEntry::new(bad).validate(),
                    Err(LaunchError::InvalidScheme(_))
                ),
                "{}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_default_shortcut_points_at_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::load_at(temp_dir.path().join("config.json")).unwrap();

        let provider = ShortcutEntry::provider(&mut config).unwrap();
        assert_eq!(provider.entry_keys().await.unwrap(), vec!["🔗 config".to_string()]);

        let entry = provider.fetch("🔗 config").unwrap();
        let shortcut = entry.as_any().downcast_ref::<ShortcutEntry>().unwrap();
        assert_eq!(Path::new(shortcut.target()), config.path());
    }

    #[test]
    fn test_invalid_stored_shortcut_fails_provider() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"providers-config": {"shortcuts": {"bad": "ftp://example.com"}}}"#,
        )
        .unwrap();
        let mut config = Config::load_at(&path).unwrap();

        assert!(matches!(
            ShortcutEntry::provider(&mut config),
            Err(LaunchError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_add_shortcut_rejects_bad_scheme() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::load_at(temp_dir.path().join("config.json")).unwrap();
        let shortcuts = HashMap::from([("x".to_string(), ShortcutEntry::new("ftp://x"))]);

        assert!(matches!(
            add_shortcuts_to_config(&mut config, shortcuts, false),
            Err(LaunchError::InvalidScheme(_))
        ));
        assert!(config.providers.get(ProviderKeys::SHORTCUTS).is_none());
    }
}
