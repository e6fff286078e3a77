//! One-shot RPC client: connect, issue a single call, drop the connection.

use super::protocol::{read_frame, write_frame, RpcArg, RpcRequest, RpcResponse};
use crate::config::RemoteConfig;
use crate::{LaunchError, Result};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug)]
pub struct RpcClient {
    stream: TcpStream,
    addr: String,
}

impl RpcClient {
    /// Connect to `addr` within [`RemoteConfig::CONNECT_TIMEOUT`].
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = tokio::time::timeout(RemoteConfig::CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| LaunchError::Timeout(RemoteConfig::CONNECT_TIMEOUT))?
            .map_err(|e| LaunchError::Network {
                message: format!("Unable to reach {}: {}", addr, e),
                unreachable: e.kind() == ErrorKind::ConnectionRefused,
            })?;

        debug!("RPC client connected to {}", addr);
        Ok(Self {
            stream,
            addr: addr.to_string(),
        })
    }

    /// Call the launcher method with `arg`, optionally bounded by `timeout`.
    pub async fn call(self, arg: RpcArg, timeout: Option<Duration>) -> Result<()> {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.exchange(arg))
                .await
                .map_err(|_| LaunchError::Timeout(timeout))?,
            None => self.exchange(arg).await,
        }
    }

    async fn exchange(mut self, arg: RpcArg) -> Result<()> {
        let request = RpcRequest::new(RemoteConfig::RPC_TARGET, serde_json::to_value(&arg)?, 1);
        let (mut reader, mut writer) = self.stream.split();

        write_frame(&mut writer, &serde_json::to_vec(&request)?)
            .await
            .map_err(|e| lost(&self.addr, e))?;

        let frame = read_frame(&mut reader)
            .await
            .map_err(|e| lost(&self.addr, e))?
            .ok_or_else(|| LaunchError::Network {
                message: format!("{} closed the connection without replying", self.addr),
                unreachable: false,
            })?;

        let response: RpcResponse =
            serde_json::from_slice(&frame).map_err(|e| LaunchError::Json {
                message: format!("Failed to parse RPC response: {}", e),
                source: Some(e),
            })?;

        match response.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

fn lost(addr: &str, err: LaunchError) -> LaunchError {
    match err {
        LaunchError::Validation { .. } => err,
        other => LaunchError::Network {
            message: format!("Connection to {} lost: {}", addr, other),
            unreachable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = RpcClient::connect(&addr).await.unwrap_err();
        assert!(err.is_unreachable(), "{}", err);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let client = RpcClient::connect(&addr).await.unwrap();
        let timeout = Duration::from_millis(100);
        let err = client.call(RpcArg::ping(), Some(timeout)).await.unwrap_err();
        assert!(matches!(err, LaunchError::Timeout(t) if t == timeout));
        drop(listener);
    }
}
