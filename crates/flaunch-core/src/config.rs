//! Centralized configuration constants for flaunch.
//!
//! Persistent, user-editable settings live in [`crate::settings`]; this module
//! only holds compile-time defaults and limits.

use std::time::Duration;

/// Remote backend defaults and limits.
pub struct RemoteConfig;

impl RemoteConfig {
    /// Configuration key of the HTTP backend.
    pub const HTTP_KEY: &'static str = "http";
    /// Configuration key of the RPC backend.
    pub const RPC_KEY: &'static str = "rpc";

    pub const DEFAULT_HTTP_ADDR: &'static str = "localhost:8080";
    pub const DEFAULT_RPC_ADDR: &'static str = "localhost:8867";

    /// Liveness probes target a local or LAN instance, 500ms is plenty.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
    /// Timeout for a `close` request.
    pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Maximum size of a single RPC frame (1 MiB).
    pub const MAX_RPC_MESSAGE_SIZE: usize = 1024 * 1024;
    /// Maximum concurrent RPC connections.
    pub const MAX_RPC_CONNECTIONS: usize = 16;
    /// Name of the single JSON-RPC method served by the RPC backend.
    pub const RPC_TARGET: &'static str = "launcher";
}

/// Desktop file discovery settings.
pub struct ScanConfig;

impl ScanConfig {
    /// Number of parser tasks in the worker-pool strategy.
    pub const WORKER_POOL_SIZE: usize = 32;
    /// Capacity of the path queue between the walker and the workers.
    pub const PATH_QUEUE_CAPACITY: usize = 64;
    /// File extension of desktop entries.
    pub const DESKTOP_FILE_EXTENSION: &'static str = "desktop";
}

/// File and directory names.
pub struct ConfigPaths;

impl ConfigPaths {
    pub const APP_DIR_NAME: &'static str = "flaunch";
    pub const CONFIG_FILE_NAME: &'static str = "config.json";
    pub const LOCK_SUFFIX: &'static str = "lock";
    /// Relative to the home directory.
    pub const DEFAULT_LOG_FILE: &'static str = ".log/flaunch.log";
}
