//! Remote backends: a long-running companion process that launches entries.
//!
//! The picker runs in a short-lived terminal; entries that must outlive it
//! (applications, files opened with the desktop's default handler) are
//! encoded and sent to a remote instance started with [`Remote::start`].
//!
//! Two interchangeable backends implement the same [`Remote`] contract:
//!
//! - [`HttpRemote`]: plain HTTP routes (`/ping`, `/`, `/close`).
//! - [`RpcRemote`]: length-prefixed JSON-RPC 2.0 over TCP.
//!
//! [`RemoteBackend`] picks one from the configuration.

mod http;
pub mod rpc;

pub use http::HttpRemote;
pub use rpc::RpcRemote;

use crate::config::RemoteConfig;
use crate::entry::{Entry, EntryOptions, EntryRegistry};
use crate::settings::{Config, SectionTable};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Contract shared by every backend.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Serve until the instance is told to stop or the listener fails.
    async fn start(&self) -> Result<()>;

    /// Stop the instance running at the configured address. Succeeds when no
    /// instance is running.
    async fn close(&self) -> Result<()>;

    /// Check that an instance is reachable, within a short timeout.
    async fn connect(&self) -> Result<()>;

    /// Send an entry to the running instance and wait for its launch result.
    async fn handle_entry(&self, entry: &dyn Entry, options: &EntryOptions) -> Result<()>;
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteKind {
    #[default]
    Http,
    Rpc,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Http => RemoteConfig::HTTP_KEY,
            RemoteKind::Rpc => RemoteConfig::RPC_KEY,
        }
    }
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteKind {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | RemoteConfig::HTTP_KEY => Ok(RemoteKind::Http),
            RemoteConfig::RPC_KEY => Ok(RemoteKind::Rpc),
            other => Err(LaunchError::InvalidRemote(other.to_string())),
        }
    }
}

/// Settings of the HTTP backend, under `remotes-configs.http`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: RemoteConfig::DEFAULT_HTTP_ADDR.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        validate_addr("http.addr", &self.addr)
    }
}

/// Settings of the RPC backend, under `remotes-configs.rpc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub addr: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            addr: RemoteConfig::DEFAULT_RPC_ADDR.to_string(),
        }
    }
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        validate_addr("rpc.addr", &self.addr)
    }
}

/// `host:port`, both parts required.
fn validate_addr(field: &str, addr: &str) -> Result<()> {
    let invalid = |message: String| LaunchError::Validation {
        field: field.to_string(),
        message,
    };

    if addr.trim().is_empty() {
        return Err(invalid("address is empty".to_string()));
    }

    let url = Url::parse(&format!("tcp://{}", addr))
        .map_err(|e| invalid(format!("{:?} is not a valid address: {}", addr, e)))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(format!("{:?} has no host", addr)));
    }
    if url.port().is_none() {
        return Err(invalid(format!("{:?} has no port", addr)));
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() {
        return Err(invalid(format!("{:?} must be host:port", addr)));
    }

    Ok(())
}

/// The backend selected in the configuration.
pub enum RemoteBackend {
    Http(HttpRemote),
    Rpc(RpcRemote),
}

impl RemoteBackend {
    /// Build the backend of `kind` (or of `selected-remote` when `None`).
    ///
    /// Both backend sections are validated, and written with their defaults
    /// when absent.
    pub fn from_config(
        config: &mut Config,
        registry: Arc<EntryRegistry>,
        kind: Option<RemoteKind>,
    ) -> Result<Self> {
        let kind = match kind {
            Some(kind) => kind,
            None => config.selected_remote.parse()?,
        };

        let rpc_config: RpcConfig =
            config.section_or_default(SectionTable::Remotes, RemoteConfig::RPC_KEY, RpcConfig::default)?;
        rpc_config.validate()?;

        let http_config: HttpConfig = config.section_or_default(
            SectionTable::Remotes,
            RemoteConfig::HTTP_KEY,
            HttpConfig::default,
        )?;
        http_config.validate()?;

        debug!("Using the {} remote", kind);
        Ok(match kind {
            RemoteKind::Http => RemoteBackend::Http(HttpRemote::new(http_config, registry)),
            RemoteKind::Rpc => RemoteBackend::Rpc(RpcRemote::new(rpc_config, registry)),
        })
    }

    pub fn kind(&self) -> RemoteKind {
        match self {
            RemoteBackend::Http(_) => RemoteKind::Http,
            RemoteBackend::Rpc(_) => RemoteKind::Rpc,
        }
    }

    fn inner(&self) -> &dyn Remote {
        match self {
            RemoteBackend::Http(remote) => remote,
            RemoteBackend::Rpc(remote) => remote,
        }
    }
}

#[async_trait]
impl Remote for RemoteBackend {
    async fn start(&self) -> Result<()> {
        self.inner().start().await
    }

    async fn close(&self) -> Result<()> {
        self.inner().close().await
    }

    async fn connect(&self) -> Result<()> {
        self.inner().connect().await
    }

    async fn handle_entry(&self, entry: &dyn Entry, options: &EntryOptions) -> Result<()> {
        self.inner().handle_entry(entry, options).await
    }
}

/// Build the selected backend and check that an instance is running.
pub async fn connect_remote(
    config: &mut Config,
    registry: Arc<EntryRegistry>,
    kind: Option<RemoteKind>,
) -> Result<RemoteBackend> {
    let remote = RemoteBackend::from_config(config, registry, kind)?;
    remote.connect().await?;
    Ok(remote)
}

/// Run `remote` until it stops on its own or `shutdown` resolves, in which
/// case the instance is closed and drained before returning.
///
/// The served instance answers its own close request, so `start` keeps being
/// polled while `close` is in flight.
pub async fn serve_until_interrupted<R, F>(remote: &R, shutdown: F) -> Result<()>
where
    R: Remote + ?Sized,
    F: Future<Output = ()>,
{
    let start = remote.start();
    tokio::pin!(start);

    tokio::select! {
        result = &mut start => return result,
        _ = shutdown => info!("Shutdown requested, closing the remote"),
    }

    let close = remote.close();
    tokio::pin!(close);

    let mut started = None;
    let closed = loop {
        tokio::select! {
            result = &mut start, if started.is_none() => started = Some(result),
            result = &mut close => break result,
        }
    };
    closed?;

    match started {
        Some(result) => result,
        None => start.await,
    }
}
