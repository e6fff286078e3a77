//! Error types for flaunch.
//!
//! A single error enum covers the whole launcher. Variants are grouped by the
//! layer that produces them so that transports can decide how to report them
//! (HTTP status, JSON-RPC error code) without inspecting messages.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the flaunch library.
#[derive(Debug, Error)]
pub enum LaunchError {
    // Registry errors
    #[error("Entry variant already registered: {key}")]
    AlreadyRegistered { key: String },

    #[error("Entry variant not registered: {key}")]
    NotRegistered { key: String },

    // Envelope errors
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope { message: String },

    #[error("Serialized entry was built with a different version of the launcher (expected {expected:?}, found {found:?})")]
    VersionMismatch { expected: String, found: String },

    #[error("Failed to decode payload of {key}: {message}")]
    PayloadDecode { key: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid desktop file {path}: {message}")]
    DesktopFile { path: PathBuf, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Whether the peer could not be reached at all.
        unreachable: bool,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Error at {route}: expected 200 OK but received {status}. Response body: {body}")]
    RemoteStatus {
        route: String,
        status: u16,
        body: String,
    },

    #[error("Remote call failed ({code}): {message}")]
    RemoteCall { code: i32, message: String },

    #[error("Invalid argument kind passed: {0}")]
    InvalidArgumentKind(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    // Execution errors
    #[error("A remote is required for this entry")]
    RemoteRequired,

    #[error("Entry not found in this provider")]
    NotFound,

    #[error("Launch failed for {entry}: {message}")]
    LaunchFailed { entry: String, message: String },

    #[error("Key not handled: {0}")]
    KeyNotHandled(String),

    #[error("Unable to launch {0} from a remote")]
    RemoteLaunchUnsupported(String),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid remote: {0:?}")]
    InvalidRemote(String),

    #[error("Forbidden scheme in URL: {0}")]
    InvalidScheme(String),

    // Frontend errors
    #[error("No entry selected")]
    NoEntrySelected,

    #[error("No newline found at the end of entry")]
    NoNewLine,

    #[error("Bad selection: {0}")]
    BadSelection(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for flaunch operations.
pub type Result<T> = std::result::Result<T, LaunchError>;

impl From<std::io::Error> for LaunchError {
    fn from(err: std::io::Error) -> Self {
        LaunchError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(err: serde_json::Error) -> Self {
        LaunchError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for LaunchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LaunchError::Timeout(Duration::from_secs(0))
        } else {
            LaunchError::Network {
                message: err.to_string(),
                unreachable: err.is_connect(),
            }
        }
    }
}

impl LaunchError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LaunchError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a desktop file error.
    pub fn desktop_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LaunchError::DesktopFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error was caused by the envelope a caller sent, as opposed
    /// to a failure while executing the decoded entry.
    pub fn is_envelope_error(&self) -> bool {
        matches!(
            self,
            LaunchError::MalformedEnvelope { .. }
                | LaunchError::VersionMismatch { .. }
                | LaunchError::NotRegistered { .. }
                | LaunchError::PayloadDecode { .. }
        )
    }

    /// Whether the error means no remote instance could be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            LaunchError::Network {
                unreachable: true,
                ..
            }
        )
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application codes:
    /// - -32000: Network/connectivity error
    /// - -32001: Envelope rejected (malformed, version, unregistered, payload)
    /// - -32002: Entry execution failed
    /// - -32003: Invalid argument kind
    /// - -32005: Validation error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            LaunchError::Network { .. } | LaunchError::Timeout(_) => -32000,

            LaunchError::MalformedEnvelope { .. }
            | LaunchError::VersionMismatch { .. }
            | LaunchError::NotRegistered { .. }
            | LaunchError::PayloadDecode { .. } => -32001,

            LaunchError::LaunchFailed { .. }
            | LaunchError::KeyNotHandled(_)
            | LaunchError::RemoteLaunchUnsupported(_)
            | LaunchError::RemoteRequired => -32002,

            LaunchError::InvalidArgumentKind(_) => -32003,

            LaunchError::MethodNotFound(_) => -32601,

            LaunchError::Validation { .. } | LaunchError::InvalidScheme(_) => -32005,

            _ => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LaunchError::NotRegistered {
            key: "flaunch_core::entry::Path".into(),
        };
        assert_eq!(
            err.to_string(),
            "Entry variant not registered: flaunch_core::entry::Path"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            LaunchError::VersionMismatch {
                expected: "a".into(),
                found: "b".into()
            }
            .to_rpc_error_code(),
            -32001
        );
        assert_eq!(
            LaunchError::InvalidArgumentKind("bogus".into()).to_rpc_error_code(),
            -32003
        );
        assert_eq!(LaunchError::Other("x".into()).to_rpc_error_code(), -32603);
    }

    #[test]
    fn test_envelope_errors_are_classified() {
        assert!(LaunchError::MalformedEnvelope {
            message: "eof".into()
        }
        .is_envelope_error());
        assert!(!LaunchError::LaunchFailed {
            entry: "x".into(),
            message: "exit 1".into()
        }
        .is_envelope_error());
    }

    #[test]
    fn test_unreachable() {
        assert!(LaunchError::Network {
            message: "refused".into(),
            unreachable: true
        }
        .is_unreachable());
        assert!(!LaunchError::Timeout(Duration::from_millis(500)).is_unreachable());
    }
}
