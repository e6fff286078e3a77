//! flaunch - fuzzy launcher for paths, commands, shortcuts and applications.
//!
//! `flaunch pick` lists every entry in fzf and launches the selection. Entries
//! that must outlive the terminal are forwarded to a remote started with
//! `flaunch start-remote`.

mod logging;
mod pick;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flaunch_core::entry::{
    add_commands_to_config, add_shortcuts_to_config, OPTION_BASE_DIRECTORY, OPTION_HIDE_FILES,
    OPTION_HIDE_FOLDERS, OPTION_IGNORE_VCS,
};
use flaunch_core::{
    serve_until_interrupted, CommandEntry, Config, EntryOptions, EntryRegistry, Remote,
    RemoteBackend, RemoteKind, ShortcutEntry,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "flaunch", version)]
#[command(about = "Fuzzy launcher for paths, commands, shortcuts and applications")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file (defaults to <config dir>/flaunch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pick an entry with fzf and launch it
    Pick {
        /// Directory listed by the path provider (defaults to the configured one)
        base_dir: Option<PathBuf>,

        /// Do not list files
        #[arg(long)]
        hide_files: bool,

        /// Do not list folders
        #[arg(long)]
        hide_folders: bool,

        /// Also list files ignored by version control
        #[arg(long)]
        ignore_vcs: bool,
    },

    /// Run a remote until it is killed or interrupted
    StartRemote {
        /// Backend to run (defaults to `selected-remote`)
        #[arg(long)]
        remote: Option<RemoteKind>,
    },

    /// Stop a running remote
    KillRemote {
        /// Backend to stop (defaults to `selected-remote`)
        #[arg(long)]
        remote: Option<RemoteKind>,
    },

    /// Add a shortcut (URL or absolute path)
    AddShortcut {
        name: String,
        target: String,

        /// Replace an existing shortcut with the same name
        #[arg(long = "override")]
        overwrite: bool,
    },

    /// Add a command, options go before NAME
    AddCommand {
        /// Seconds to wait before closing after a successful run
        #[arg(long, default_value_t = 0)]
        delay: u64,

        /// Close immediately when the command fails
        #[arg(long)]
        close_on_failure: bool,

        /// Replace an existing command with the same name
        #[arg(long = "override")]
        overwrite: bool,

        name: String,
        program: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_at(path),
        None => Config::load(),
    }
    .context("Failed to load the configuration")?;

    let picking = matches!(cli.command, Commands::Pick { .. });
    logging::init(cli.debug, logging::log_file(&config, picking))?;
    debug!("Configuration loaded from {}", config.path().display());

    let registry = Arc::new(EntryRegistry::with_builtin_variants()?);

    match cli.command {
        Commands::Pick {
            base_dir,
            hide_files,
            hide_folders,
            ignore_vcs,
        } => {
            let options = pick_options(base_dir, hide_files, hide_folders, ignore_vcs)?;
            pick::run(&mut config, registry, options).await?;
        }
        Commands::StartRemote { remote } => {
            let remote = RemoteBackend::from_config(&mut config, registry, remote)?;
            info!("Starting the {} remote", remote.kind());
            serve_until_interrupted(&remote, interrupted()).await?;
            info!("Remote stopped");
        }
        Commands::KillRemote { remote } => {
            let remote = RemoteBackend::from_config(&mut config, registry, remote)?;
            remote.close().await?;
            info!("The {} remote is stopped", remote.kind());
        }
        Commands::AddShortcut {
            name,
            target,
            overwrite,
        } => {
            let shortcuts = HashMap::from([(name, ShortcutEntry::new(target))]);
            add_shortcuts_to_config(&mut config, shortcuts, overwrite)?;
        }
        Commands::AddCommand {
            delay,
            close_on_failure,
            overwrite,
            name,
            program,
            args,
        } => {
            let command = CommandEntry::new(program, args)
                .with_delay(delay)
                .with_close_on_failure(close_on_failure);
            add_commands_to_config(&mut config, HashMap::from([(name, command)]), overwrite)?;
        }
    }

    Ok(())
}

fn pick_options(
    base_dir: Option<PathBuf>,
    hide_files: bool,
    hide_folders: bool,
    ignore_vcs: bool,
) -> Result<EntryOptions> {
    let mut options = EntryOptions::new();

    if let Some(base_dir) = base_dir {
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        options.insert(
            OPTION_BASE_DIRECTORY.to_string(),
            base_dir.to_string_lossy().into_owned(),
        );
    }

    for (key, set) in [
        (OPTION_HIDE_FILES, hide_files),
        (OPTION_HIDE_FOLDERS, hide_folders),
        (OPTION_IGNORE_VCS, ignore_vcs),
    ] {
        if set {
            options.insert(key.to_string(), "true".to_string());
        }
    }

    Ok(options)
}

/// Resolves on Ctrl-C. Never resolves if the signal cannot be listened to.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
