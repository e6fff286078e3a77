//! Build identification.
//!
//! Envelopes carry the build version of the process that produced them and are
//! only decoded by a process with the same build version. Release builds can
//! stamp the commit and timestamp through the `FLAUNCH_COMMIT_HASH` and
//! `FLAUNCH_BUILD_TIMESTAMP` environment variables at compile time.

/// Crate version from Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash the binary was built from, if stamped.
pub const COMMIT_HASH: &str = match option_env!("FLAUNCH_COMMIT_HASH") {
    Some(hash) => hash,
    None => "n/a",
};

/// Build timestamp, if stamped.
pub const BUILD_TIMESTAMP: &str = match option_env!("FLAUNCH_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "n/a",
};

/// Full build version string: `<version>-<commit> (<timestamp>)`.
pub fn build_version() -> String {
    format!("{}-{} ({})", VERSION, COMMIT_HASH, BUILD_TIMESTAMP)
}
