//! Discovery of the desktop applications installed on the machine.
//!
//! A scan reads every `*.desktop` file of a list of candidate directories and
//! returns the visible, non-blacklisted applications keyed by display name.
//! Three strategies produce the same result set:
//!
//! - [`ScanStrategy::Sequential`]: one directory after the other, the baseline.
//! - [`ScanStrategy::FanOut`]: one blocking task per directory, partial maps
//!   merged by the caller.
//! - [`ScanStrategy::WorkerPool`]: a walker streams file paths into a bounded
//!   queue read by a fixed pool of parsing workers.
//!
//! Any error aborts the whole scan: every task is cancelled and joined before
//! the error is returned. Duplicate display names are resolved by whichever
//! record is merged last, which is unordered for the concurrent strategies.

mod desktop_entry;
mod fan_out;
mod pipeline;

pub use desktop_entry::{DesktopEntry, DesktopEntryError};

use crate::config::ScanConfig;
use crate::entry::DesktopFile;
use crate::{LaunchError, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Scan result: display name -> application.
pub type DesktopFiles = HashMap<String, DesktopFile>;

/// What to scan and what to leave out.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Directories holding `.desktop` files, scanned in order.
    pub directories: Vec<PathBuf>,
    /// Identifiers (file names) never returned.
    pub blacklist: HashSet<String>,
    /// Current desktop environments, for `OnlyShowIn`/`NotShowIn`.
    pub desktops: Vec<String>,
}

impl ScanRequest {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            ..Default::default()
        }
    }

    pub fn with_blacklist<I, S>(mut self, blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = blacklist.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_desktops(mut self, desktops: Vec<String>) -> Self {
        self.desktops = desktops;
        self
    }

    /// Scan of the XDG data directories for the current desktop.
    pub fn from_env(blacklist: Vec<String>) -> Self {
        Self::new(candidate_directories())
            .with_blacklist(blacklist)
            .with_desktops(current_desktops())
    }

    /// Parse one file, returning the record when it should be listed.
    pub(crate) fn read_record(&self, path: &Path) -> Result<Option<DesktopFile>> {
        let content = fs::read_to_string(path).map_err(|e| LaunchError::io_with_path(e, path))?;
        self.record_from(path, &content)
    }

    pub(crate) async fn read_record_async(&self, path: &Path) -> Result<Option<DesktopFile>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LaunchError::io_with_path(e, path))?;
        self.record_from(path, &content)
    }

    fn record_from(&self, path: &Path, content: &str) -> Result<Option<DesktopFile>> {
        let invalid = |e: DesktopEntryError| LaunchError::desktop_file(path, e.to_string());
        let entry = DesktopEntry::parse(content).map_err(invalid)?;
        if !entry.is_visible(&self.desktops).map_err(invalid)? {
            return Ok(None);
        }

        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.blacklist.contains(&identifier) {
            debug!("Skipping blacklisted {}", identifier);
            return Ok(None);
        }

        Ok(Some(DesktopFile::new(entry.name, identifier)))
    }
}

/// How to run a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    Sequential,
    FanOut,
    WorkerPool { workers: usize },
}

impl Default for ScanStrategy {
    fn default() -> Self {
        ScanStrategy::WorkerPool {
            workers: ScanConfig::WORKER_POOL_SIZE,
        }
    }
}

impl ScanStrategy {
    /// Scan every directory of `request`.
    ///
    /// A returned scan, successful or not, has joined every task it spawned.
    /// A dropped scan cancels its tasks, which terminate promptly.
    pub async fn scan(self, request: ScanRequest) -> Result<DesktopFiles> {
        let request = Arc::new(request);
        let result = match self {
            ScanStrategy::Sequential => {
                let request = Arc::clone(&request);
                tokio::task::spawn_blocking(move || scan_sequential(&request))
                    .await
                    .map_err(join_error)?
            }
            ScanStrategy::FanOut => fan_out::scan(Arc::clone(&request)).await,
            ScanStrategy::WorkerPool { workers } => {
                pipeline::scan(Arc::clone(&request), workers).await
            }
        };

        if let Ok(files) = &result {
            info!(
                "Found {} applications in {} directories ({:?})",
                files.len(),
                request.directories.len(),
                self
            );
        }
        result
    }
}

/// Scan every directory of `request` on the calling thread.
pub fn scan_sequential(request: &ScanRequest) -> Result<DesktopFiles> {
    let never = CancellationToken::new();
    let mut results = DesktopFiles::with_capacity(32 * request.directories.len());
    for directory in &request.directories {
        results.extend(scan_directory(directory, request, &never)?);
    }
    Ok(results)
}

/// Scan a single directory, stopping early once `cancelled` fires.
pub(crate) fn scan_directory(
    directory: &Path,
    request: &ScanRequest,
    cancelled: &CancellationToken,
) -> Result<DesktopFiles> {
    let mut results = DesktopFiles::new();
    if !check_directory(directory)? {
        return Ok(results);
    }

    for path in list_desktop_files(directory)? {
        if cancelled.is_cancelled() {
            break;
        }
        if let Some(desktop_file) = request.read_record(&path)? {
            results.insert(desktop_file.name.clone(), desktop_file);
        }
    }
    Ok(results)
}

/// `false` when the directory does not exist, an error when the path is not
/// a directory.
pub(crate) fn check_directory(directory: &Path) -> Result<bool> {
    match fs::metadata(directory) {
        Ok(metadata) if metadata.is_dir() => Ok(true),
        Ok(_) => Err(LaunchError::NotADirectory(directory.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Skipping missing directory {}", directory.display());
            Ok(false)
        }
        Err(e) => Err(LaunchError::io_with_path(e, directory)),
    }
}

/// The `*.desktop` files directly inside `directory`, in file name order.
pub(crate) fn list_desktop_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| LaunchError::Io {
            message: e.to_string(),
            path: e.path().map(Path::to_path_buf),
            source: None,
        })?;

        let is_desktop_file = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == ScanConfig::DESKTOP_FILE_EXTENSION);
        if is_desktop_file && !entry.file_type().is_dir() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> LaunchError {
    LaunchError::Other(format!("Scan task failed: {}", err))
}

/// Directories that may hold `.desktop` files: `$XDG_DATA_HOME` (or
/// `~/.local/share`) then every `$XDG_DATA_DIRS` entry, each joined with
/// `applications`.
pub fn candidate_directories() -> Vec<PathBuf> {
    candidate_directories_from(
        std::env::var("XDG_DATA_HOME").ok(),
        std::env::var("XDG_DATA_DIRS").ok(),
        dirs::home_dir(),
    )
}

fn candidate_directories_from(
    data_home: Option<String>,
    data_dirs: Option<String>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut directories = Vec::new();

    let data_home = data_home
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|h| h.join(".local").join("share")));
    if let Some(data_home) = data_home {
        directories.push(data_home.join("applications"));
    }

    for data_dir in data_dirs.as_deref().unwrap_or_default().split(':') {
        let data_dir = data_dir.trim();
        if !data_dir.is_empty() {
            directories.push(Path::new(data_dir).join("applications"));
        }
    }

    directories
}

/// The `XDG_CURRENT_DESKTOP` list.
pub fn current_desktops() -> Vec<String> {
    std::env::var("XDG_CURRENT_DESKTOP")
        .unwrap_or_default()
        .split(':')
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}
