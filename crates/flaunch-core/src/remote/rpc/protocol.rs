//! RPC wire format.
//!
//! Every message is one frame: a 4-byte big-endian length followed by a UTF-8
//! JSON-RPC 2.0 payload.
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! The server exposes a single method whose argument carries the operation
//! kind, so an unknown kind is reported as such instead of as a missing
//! method.

use crate::config::RemoteConfig;
use crate::{LaunchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(Value::Number(id.into())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError { code, message }),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl From<RpcError> for LaunchError {
    fn from(err: RpcError) -> Self {
        LaunchError::RemoteCall {
            code: err.code,
            message: err.message,
        }
    }
}

/// Operation requested through the launcher method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Ping,
    Stop,
    Entry,
}

impl ArgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgKind::Ping => "ping",
            ArgKind::Stop => "stop",
            ArgKind::Entry => "entry",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArgKind {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ping" => Ok(ArgKind::Ping),
            "stop" => Ok(ArgKind::Stop),
            "entry" => Ok(ArgKind::Entry),
            other => Err(LaunchError::InvalidArgumentKind(other.to_string())),
        }
    }
}

/// Argument of the launcher method.
///
/// `kind` stays a plain string on the wire so that unknown kinds reach the
/// dispatcher and fail with `InvalidArgumentKind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcArg {
    pub kind: String,
    /// Encoded envelope, only for [`ArgKind::Entry`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl RpcArg {
    pub fn ping() -> Self {
        Self {
            kind: ArgKind::Ping.to_string(),
            payload: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            kind: ArgKind::Stop.to_string(),
            payload: None,
        }
    }

    pub fn entry(envelope: Vec<u8>) -> Result<Self> {
        let envelope = String::from_utf8(envelope).map_err(|e| LaunchError::MalformedEnvelope {
            message: format!("envelope is not UTF-8: {}", e),
        })?;
        Ok(Self {
            kind: ArgKind::Entry.to_string(),
            payload: Some(envelope),
        })
    }

    pub fn kind(&self) -> Result<ArgKind> {
        self.kind.parse()
    }
}

/// Read one frame. `None` on clean EOF.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > RemoteConfig::MAX_RPC_MESSAGE_SIZE {
        return Err(LaunchError::Validation {
            field: "rpc_frame".to_string(),
            message: format!(
                "RPC message size {} exceeds maximum {}",
                len,
                RemoteConfig::MAX_RPC_MESSAGE_SIZE
            ),
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > RemoteConfig::MAX_RPC_MESSAGE_SIZE {
        return Err(LaunchError::Validation {
            field: "rpc_frame".to_string(),
            message: format!(
                "RPC message size {} exceeds maximum {}",
                payload.len(),
                RemoteConfig::MAX_RPC_MESSAGE_SIZE
            ),
        });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_has_no_error_field() {
        let response = RpcResponse::success(Some(Value::from(1)), Value::Null);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));

        // a null result still reads back as a success
        let parsed: RpcResponse = serde_json::from_str(&json).unwrap();
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_error_response_converts_to_remote_call() {
        let response = RpcResponse::error(None, -32003, "Invalid argument kind: nope".into());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"result\""));

        let parsed: RpcResponse = serde_json::from_str(&json).unwrap();
        let err: LaunchError = parsed.error.unwrap().into();
        assert!(matches!(err, LaunchError::RemoteCall { code: -32003, .. }));
    }

    #[test]
    fn test_arg_kinds() {
        assert_eq!(RpcArg::ping().kind().unwrap(), ArgKind::Ping);
        assert_eq!(RpcArg::stop().kind().unwrap(), ArgKind::Stop);

        let arg = RpcArg::entry(br#"{"type":"x"}"#.to_vec()).unwrap();
        assert_eq!(arg.kind().unwrap(), ArgKind::Entry);
        assert_eq!(arg.payload.as_deref(), Some(r#"{"type":"x"}"#));
        assert_eq!(
            serde_json::to_value(&arg).unwrap(),
            serde_json::json!({ "kind": "entry", "payload": r#"{"type":"x"}"# })
        );
        assert_eq!(
            serde_json::to_value(RpcArg::ping()).unwrap(),
            serde_json::json!({ "kind": "ping" })
        );

        let unknown: RpcArg = serde_json::from_str(r#"{"kind": "reboot"}"#).unwrap();
        assert!(matches!(
            unknown.kind(),
            Err(LaunchError::InvalidArgumentKind(kind)) if kind == "reboot"
        ));
    }

    #[test]
    fn test_entry_arg_requires_utf8() {
        assert!(matches!(
            RpcArg::entry(vec![0xff, 0xfe]),
            Err(LaunchError::MalformedEnvelope { .. })
        ));
    }

    #[tokio::test]
    async fn test_frames_back_to_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first").await.unwrap();
        write_frame(&mut buf, b"").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_frame(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((RemoteConfig::MAX_RPC_MESSAGE_SIZE + 1) as u32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(LaunchError::Validation { .. })
        ));
    }
}
