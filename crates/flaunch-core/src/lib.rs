//! Flaunch Core - entry registry, desktop file discovery and remote backends
//! for the flaunch launcher.
//!
//! The picker lists entries from every configured provider, hands the keys to
//! a [`Frontend`], and launches the selected entry. Entries that must outlive
//! the picker are encoded by the [`EntryRegistry`] and sent to a running
//! [`Remote`].
//!
//! # Example
//!
//! ```rust,ignore
//! use flaunch_core::{connect_remote, Config, EntryRegistry, PathEntry, Remote};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> flaunch_core::Result<()> {
//!     let mut config = Config::load()?;
//!     let registry = Arc::new(EntryRegistry::with_builtin_variants()?);
//!
//!     let remote = connect_remote(&mut config, registry, None).await?;
//!     let entry = PathEntry::new("/home/me/notes.md");
//!     remote.handle_entry(&entry, &Default::default()).await
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod frontend;
pub mod remote;
pub mod settings;
pub mod version;

pub use discovery::{DesktopFiles, ScanRequest, ScanStrategy};
pub use entry::{
    build_providers, fetch_entry, CommandEntry, DesktopFile, Entry, EntryOptions, EntryProvider,
    EntryRegistry, EntryVariant, Envelope, PathEntry, ProviderKeys, ShortcutEntry, OPTION_RESTART,
};
pub use error::{LaunchError, Result};
pub use frontend::{Frontend, FzfFrontend};
pub use remote::{
    connect_remote, serve_until_interrupted, HttpRemote, Remote, RemoteBackend, RemoteKind,
    RpcRemote,
};
pub use settings::Config;
