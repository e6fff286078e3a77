//! Walker -> bounded path queue -> worker pool -> results queue.
//!
//! A blocking walker lists the `.desktop` files of every directory into a
//! bounded queue. A fixed pool of workers shares the receiving end, parses
//! each file and sends accepted records to the caller. A join task waits for
//! the pool, so the results queue closes once every worker is done. Walk
//! failures come back on their own channel and are checked after the
//! results are drained.
//!
//! The first failed record cancels the walker and every worker, and all of
//! them are joined before `scan` returns. When the caller drops the future
//! instead, the drop guard cancels the scan and the detached tasks terminate
//! shortly after.

use super::{check_directory, join_error, list_desktop_files, DesktopFiles, ScanRequest};
use crate::config::ScanConfig;
use crate::entry::DesktopFile;
use crate::{LaunchError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type PathQueue = Arc<Mutex<mpsc::Receiver<PathBuf>>>;

pub(crate) async fn scan(request: Arc<ScanRequest>, workers: usize) -> Result<DesktopFiles> {
    let workers = workers.max(1);
    let done = CancellationToken::new();
    let _cancel_on_drop = done.clone().drop_guard();

    let (paths_tx, paths_rx) = mpsc::channel(ScanConfig::PATH_QUEUE_CAPACITY);
    let (walk_result_tx, walk_result_rx) = oneshot::channel();
    let walker = {
        let directories = request.directories.clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = walk(&directories, &paths_tx, &done);
            let _ = walk_result_tx.send(outcome);
        })
    };

    let (results_tx, mut results_rx) = mpsc::channel(workers);
    let paths_rx: PathQueue = Arc::new(Mutex::new(paths_rx));
    let mut pool = JoinSet::new();
    for _ in 0..workers {
        pool.spawn(digest(
            Arc::clone(&request),
            Arc::clone(&paths_rx),
            results_tx.clone(),
            done.clone(),
        ));
    }
    // the walker sees the queue close once the last worker exits
    drop(paths_rx);
    drop(results_tx);

    let joiner = tokio::spawn(async move {
        let mut first_panic: Option<JoinError> = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                first_panic.get_or_insert(e);
            }
        }
        first_panic
    });

    let mut merged = DesktopFiles::with_capacity(128);
    let mut failure = None;
    while let Some(record) = results_rx.recv().await {
        match record {
            Ok(desktop_file) => {
                merged.insert(desktop_file.name.clone(), desktop_file);
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if failure.is_some() {
        done.cancel();
    }
    drop(results_rx);

    let worker_panic = joiner.await.map_err(join_error)?;
    let walk_result = walk_result_rx.await;
    walker.await.map_err(join_error)?;

    if let Some(e) = failure {
        return Err(e);
    }
    if let Some(e) = worker_panic {
        return Err(join_error(e));
    }
    match walk_result {
        Ok(outcome) => outcome.map(|()| merged),
        Err(_) => Err(LaunchError::Other("Directory walk ended without a result".into())),
    }
}

/// List every `.desktop` file into `paths`, stopping when the scan is
/// abandoned or nobody reads the queue anymore.
fn walk(
    directories: &[PathBuf],
    paths: &mpsc::Sender<PathBuf>,
    done: &CancellationToken,
) -> Result<()> {
    for directory in directories {
        if !check_directory(directory)? {
            continue;
        }
        for path in list_desktop_files(directory)? {
            if done.is_cancelled() || paths.blocking_send(path).is_err() {
                debug!("Directory walk abandoned");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Parse paths until the queue closes or the scan is abandoned.
async fn digest(
    request: Arc<ScanRequest>,
    paths: PathQueue,
    results: mpsc::Sender<Result<DesktopFile>>,
    done: CancellationToken,
) {
    loop {
        let next = {
            let mut paths = paths.lock().await;
            tokio::select! {
                _ = done.cancelled() => None,
                path = paths.recv() => path,
            }
        };
        let Some(path) = next else {
            return;
        };

        let record = match request.read_record_async(&path).await {
            Ok(Some(desktop_file)) => Ok(desktop_file),
            Ok(None) => continue,
            Err(e) => Err(e),
        };

        tokio::select! {
            _ = done.cancelled() => return,
            sent = results.send(record) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
