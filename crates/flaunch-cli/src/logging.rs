//! Logging setup.
//!
//! Logs go to stderr unless a log file is configured. The picker always logs
//! to a file since fzf owns the terminal.

use anyhow::{Context, Result};
use flaunch_core::config::ConfigPaths;
use flaunch_core::Config;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where to write logs, `None` for stderr.
pub fn log_file(config: &Config, picking: bool) -> Option<PathBuf> {
    let configured = (!config.log_file.is_empty()).then(|| PathBuf::from(&config.log_file));
    let path = match configured {
        Some(path) => path,
        None if picking => PathBuf::from(ConfigPaths::DEFAULT_LOG_FILE),
        None => return None,
    };

    if path.is_absolute() {
        return Some(path);
    }
    Some(dirs::home_dir().unwrap_or_default().join(path))
}

pub fn init(debug: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_selection() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::load_at(temp_dir.path().join("config.json")).unwrap();
        config.log_file = String::new();

        assert_eq!(log_file(&config, false), None);
        let picker_log = log_file(&config, true).unwrap();
        assert!(picker_log.ends_with(ConfigPaths::DEFAULT_LOG_FILE));

        config.log_file = "/tmp/flaunch-test.log".to_string();
        assert_eq!(
            log_file(&config, false),
            Some(PathBuf::from("/tmp/flaunch-test.log"))
        );
    }
}
