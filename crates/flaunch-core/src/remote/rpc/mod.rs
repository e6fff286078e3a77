//! RPC backend: length-prefixed JSON-RPC 2.0 over TCP.
//!
//! The server registers one method, [`RemoteConfig::RPC_TARGET`], whose
//! argument names the operation (`ping`, `stop` or `entry`). Clients open a
//! fresh connection per operation.

mod client;
pub mod protocol;
mod server;

use self::client::RpcClient;
use self::protocol::{ArgKind, RpcArg};
use self::server::RpcDispatch;
use super::{Remote, RpcConfig};
use crate::config::RemoteConfig;
use crate::entry::{Entry, EntryOptions, EntryRegistry};
use crate::{LaunchError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Dispatch target of a running session.
struct LauncherTarget {
    registry: Arc<EntryRegistry>,
    stopped: CancellationToken,
}

impl LauncherTarget {
    async fn launch(&self, arg: RpcArg) -> Result<()> {
        let envelope = arg.payload.ok_or_else(|| LaunchError::MalformedEnvelope {
            message: "entry argument without an envelope".to_string(),
        })?;
        let (entry, options) = self.registry.decode(envelope.as_bytes())?;

        debug!("Launching {:?}", entry);
        entry.launch_remote(&options).await.inspect_err(|e| {
            warn!("Launch of {:?} failed: {}", entry, e);
        })
    }
}

#[async_trait]
impl RpcDispatch for LauncherTarget {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        if method != RemoteConfig::RPC_TARGET {
            return Err(LaunchError::MethodNotFound(method.to_string()));
        }

        let arg: RpcArg = serde_json::from_value(params)?;
        match arg.kind()? {
            ArgKind::Ping => {}
            ArgKind::Stop => {
                info!("Close requested");
                self.stopped.cancel();
            }
            ArgKind::Entry => self.launch(arg).await?,
        }
        Ok(Value::Null)
    }
}

/// Remote reachable over the RPC protocol.
#[derive(Clone)]
pub struct RpcRemote {
    config: RpcConfig,
    registry: Arc<EntryRegistry>,
}

impl RpcRemote {
    pub fn new(config: RpcConfig, registry: Arc<EntryRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Serve on an already bound listener until a `stop` call arrives.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let stopped = CancellationToken::new();
        let target = Arc::new(LauncherTarget {
            registry: Arc::clone(&self.registry),
            stopped: stopped.clone(),
        });
        server::serve(listener, target, stopped).await
    }
}

#[async_trait]
impl Remote for RpcRemote {
    async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.addr)
            .await
            .map_err(|e| LaunchError::Network {
                message: format!("Unable to listen on {}: {}", self.config.addr, e),
                unreachable: false,
            })?;
        self.serve(listener).await
    }

    async fn close(&self) -> Result<()> {
        let client = match RpcClient::connect(&self.config.addr).await {
            Ok(client) => client,
            Err(e) if e.is_unreachable() => {
                debug!("No RPC remote running on {}", self.config.addr);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        client
            .call(RpcArg::stop(), Some(RemoteConfig::CLOSE_TIMEOUT))
            .await
    }

    async fn connect(&self) -> Result<()> {
        RpcClient::connect(&self.config.addr)
            .await?
            .call(RpcArg::ping(), Some(RemoteConfig::CONNECT_TIMEOUT))
            .await
    }

    async fn handle_entry(&self, entry: &dyn Entry, options: &EntryOptions) -> Result<()> {
        let arg = RpcArg::entry(self.registry.encode(entry, options)?)?;
        RpcClient::connect(&self.config.addr)
            .await?
            .call(arg, None)
            .await
    }
}
