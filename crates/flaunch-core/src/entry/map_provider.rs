use super::{Entry, EntryProvider};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Provider over a fixed map of named entries, listed with a common prefix.
#[derive(Debug, Clone)]
pub struct MapProvider<T> {
    content: HashMap<String, T>,
    prefix: String,
}

impl<T> MapProvider<T> {
    pub fn new(content: HashMap<String, T>, prefix: impl Into<String>) -> Self {
        Self {
            content,
            prefix: prefix.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[async_trait]
impl<T> EntryProvider for MapProvider<T>
where
    T: Entry + Clone,
{
    async fn entry_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .content
            .keys()
            .map(|name| format!("{}{}", self.prefix, name))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn fetch(&self, key: &str) -> Option<Box<dyn Entry>> {
        let name = key.strip_prefix(self.prefix.as_str())?;
        self.content
            .get(name)
            .map(|entry| Box::new(entry.clone()) as Box<dyn Entry>)
    }
}

/// Merge named entries into a provider's section of the configuration.
///
/// Without `overwrite`, names that already exist are reported and nothing
/// is written.
pub(crate) fn merge_into_section<T>(
    config: &mut Config,
    provider_key: &str,
    additions: HashMap<String, T>,
    overwrite: bool,
) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut current: HashMap<String, T> = config
        .section(SectionTable::Providers, provider_key)?
        .unwrap_or_default();

    if !overwrite {
        let mut duplicates: Vec<&str> = additions
            .keys()
            .filter(|name| current.contains_key(*name))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            duplicates.sort_unstable();
            return Err(LaunchError::Validation {
                field: provider_key.to_string(),
                message: format!("duplicate entries: {}", duplicates.join(", ")),
            });
        }
    }

    current.extend(additions);
    config.set_section(SectionTable::Providers, provider_key, &current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ShortcutEntry;

    fn provider() -> MapProvider<ShortcutEntry> {
        MapProvider::new(
            HashMap::from([
                ("rust".to_string(), ShortcutEntry::new("https://rust-lang.org")),
                ("crates".to_string(), ShortcutEntry::new("https://crates.io")),
            ]),
            "🔗 ",
        )
    }

    #[tokio::test]
    async fn test_keys_are_prefixed_and_sorted() {
        let keys = provider().entry_keys().await.unwrap();
        assert_eq!(keys, vec!["🔗 crates".to_string(), "🔗 rust".to_string()]);
    }

    #[test]
    fn test_fetch_requires_prefix() {
        let provider = provider();
        assert!(provider.fetch("🔗 rust").is_some());
        assert!(provider.fetch("rust").is_none());
        assert!(provider.fetch("🔗 go").is_none());
    }
}
