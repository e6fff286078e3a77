//! The picker: list, select, launch.

use anyhow::{Context, Result};
use flaunch_core::{
    build_providers, connect_remote, fetch_entry, Config, Entry, EntryOptions, EntryRegistry,
    Frontend, FzfFrontend, LaunchError, Remote, OPTION_RESTART,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Run the picker until an entry is launched or the selection is aborted.
///
/// Entries may ask for the picker to be shown again (e.g. after
/// blacklisting an application), in which case the providers are rebuilt.
pub async fn run(
    config: &mut Config,
    registry: Arc<EntryRegistry>,
    base_options: EntryOptions,
) -> Result<()> {
    let remote = connect_remote(config, registry, None)
        .await
        .context("No remote is running, start one with `flaunch start-remote`")?;

    loop {
        let mut options = base_options.clone();
        let providers = build_providers(config, &options).await?;

        let mut keys = Vec::new();
        for provider in &providers {
            keys.extend(provider.entry_keys().await?);
        }
        debug!("{} entries from {} providers", keys.len(), providers.len());

        let mut frontend = FzfFrontend::new();
        frontend.start(keys, config).await?;
        let (selected, selection_options) = match frontend.selection().await {
            Err(LaunchError::NoEntrySelected) => {
                info!("No entry selected");
                return Ok(());
            }
            selection => selection?,
        };
        options.extend(selection_options);

        let entry = fetch_entry(&providers, &selected)?;
        launch(entry.as_ref(), &frontend, &remote, config, &mut options)
            .await
            .with_context(|| format!("Failed to launch {:?}", selected))?;

        if options.get(OPTION_RESTART).map(String::as_str) != Some("true") {
            return Ok(());
        }
        info!("Restarting the picker");
    }
}

/// Launch locally when the frontend allows it, on the remote otherwise.
async fn launch(
    entry: &dyn Entry,
    frontend: &dyn Frontend,
    remote: &dyn Remote,
    config: &mut Config,
    options: &mut EntryOptions,
) -> flaunch_core::Result<()> {
    if frontend.allow_local_execution() {
        match entry.launch_local(config, options).await {
            Err(LaunchError::RemoteRequired) => debug!("{:?} requires the remote", entry),
            other => return other,
        }
    }
    remote.handle_entry(entry, options).await
}
