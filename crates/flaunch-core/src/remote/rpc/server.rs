//! Accept loop and per-connection request handling.
//!
//! Each connection runs in its own task and may carry several requests.
//! When `shutdown` is cancelled the loop stops accepting, every connection
//! finishes the request it is processing, and all of them are joined before
//! [`serve`] returns, which drops the listener.

use super::protocol::{read_frame, write_frame, RpcRequest, RpcResponse, JSONRPC_VERSION};
use crate::config::RemoteConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Handles the method calls received by the server.
#[async_trait]
pub trait RpcDispatch: Send + Sync + 'static {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value>;
}

pub async fn serve<D: RpcDispatch>(
    listener: TcpListener,
    dispatch: Arc<D>,
    shutdown: CancellationToken,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    info!("RPC remote listening on {}", local_addr);

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("RPC remote on {} shutting down", local_addr);
                break;
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("RPC accept error: {}", e);
                        continue;
                    }
                };

                if connections.len() >= RemoteConfig::MAX_RPC_CONNECTIONS {
                    warn!(
                        "Rejecting RPC connection from {}: at max capacity ({})",
                        peer_addr,
                        RemoteConfig::MAX_RPC_CONNECTIONS
                    );
                    continue;
                }

                let dispatch = Arc::clone(&dispatch);
                let shutdown = shutdown.clone();
                connections.spawn(async move {
                    debug!("RPC connection from {}", peer_addr);
                    if let Err(e) = handle_connection(stream, &*dispatch, &shutdown).await {
                        debug!("RPC connection {} ended: {}", peer_addr, e);
                    }
                });
            }
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
    info!("RPC remote on {} stopped", local_addr);
    Ok(())
}

async fn handle_connection<D: RpcDispatch>(
    mut stream: TcpStream,
    dispatch: &D,
    shutdown: &CancellationToken,
) -> Result<()> {
    let (mut reader, mut writer) = stream.split();

    loop {
        let frame = tokio::select! {
            result = read_frame(&mut reader) => match result? {
                Some(frame) => frame,
                None => return Ok(()),
            },
            _ = shutdown.cancelled() => return Ok(()),
        };

        let response = process_request(&frame, dispatch).await;
        write_frame(&mut writer, &serde_json::to_vec(&response)?).await?;
    }
}

async fn process_request<D: RpcDispatch>(frame: &[u8], dispatch: &D) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_slice(frame) {
        Ok(request) => request,
        Err(e) => return RpcResponse::error(None, -32700, format!("Parse error: {}", e)),
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return RpcResponse::error(
            request.id,
            -32600,
            "Invalid Request: expected jsonrpc 2.0".to_string(),
        );
    }

    let params = request
        .params
        .unwrap_or_else(|| Value::Object(Default::default()));

    match dispatch.dispatch(&request.method, params).await {
        Ok(result) => RpcResponse::success(request.id, result),
        Err(e) => {
            debug!("RPC call {} failed: {}", request.method, e);
            RpcResponse::error(request.id, e.to_rpc_error_code(), e.to_string())
        }
    }
}
