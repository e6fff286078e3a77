//! One blocking task per directory, partial results merged by the caller.

use super::{join_error, scan_directory, DesktopFiles, ScanRequest};
use crate::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) async fn scan(request: Arc<ScanRequest>) -> Result<DesktopFiles> {
    if request.directories.is_empty() {
        return Ok(DesktopFiles::new());
    }

    let cancelled = CancellationToken::new();
    let _cancel_on_drop = cancelled.clone().drop_guard();

    // one slot per directory: a task never blocks on send
    let (partials_tx, mut partials_rx) = mpsc::channel(request.directories.len());
    let mut tasks = JoinSet::new();

    for directory in request.directories.iter().cloned() {
        let request = Arc::clone(&request);
        let cancelled = cancelled.clone();
        let partials_tx = partials_tx.clone();

        tasks.spawn_blocking(move || {
            let partial = scan_directory(&directory, &request, &cancelled);
            if cancelled.is_cancelled() {
                debug!("Discarding scan of {}", directory.display());
                return;
            }
            let _ = partials_tx.blocking_send(partial);
        });
    }
    drop(partials_tx);

    let mut merged = DesktopFiles::with_capacity(32 * request.directories.len());
    let mut failure = None;
    while let Some(partial) = partials_rx.recv().await {
        match partial {
            Ok(files) => merged.extend(files),
            Err(e) => {
                cancelled.cancel();
                failure = Some(e);
                break;
            }
        }
    }
    drop(partials_rx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            failure.get_or_insert_with(|| join_error(e));
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(merged),
    }
}
