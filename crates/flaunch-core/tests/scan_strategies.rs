//! Every scan strategy must return the same applications for the same input.

use flaunch_core::{DesktopFiles, LaunchError, ScanRequest, ScanStrategy};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const STRATEGIES: [ScanStrategy; 4] = [
    ScanStrategy::Sequential,
    ScanStrategy::FanOut,
    ScanStrategy::WorkerPool { workers: 1 },
    ScanStrategy::WorkerPool { workers: 32 },
];

fn write_entry(dir: &Path, file_name: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(file_name), format!("[Desktop Entry]\n{}", body)).unwrap();
}

/// `count` visible applications named after their directory.
fn populate(dir: &Path, count: usize) {
    let tag = dir.file_name().unwrap().to_string_lossy().into_owned();
    for i in 0..count {
        write_entry(
            dir,
            &format!("{}-{}.desktop", tag, i),
            &format!("Name={} {}\nType=Application\n", tag, i),
        );
    }
}

async fn scan_all(request: &ScanRequest) -> Vec<Result<DesktopFiles, LaunchError>> {
    let mut results = Vec::new();
    for strategy in STRATEGIES {
        let result = tokio::time::timeout(Duration::from_secs(20), strategy.scan(request.clone()))
            .await
            .unwrap_or_else(|_| panic!("{:?} did not finish", strategy));
        results.push(result);
    }
    results
}

/// Wait until every task spawned on the test runtime has been released.
async fn assert_tasks_released() {
    let metrics = tokio::runtime::Handle::current().metrics();
    for _ in 0..100 {
        if metrics.num_alive_tasks() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} tasks still alive", metrics.num_alive_tasks());
}

async fn assert_same_result(request: ScanRequest, expected_len: usize) -> DesktopFiles {
    let mut results = scan_all(&request).await.into_iter();
    let first = results.next().unwrap().unwrap();
    assert_eq!(first.len(), expected_len);
    for (strategy, result) in STRATEGIES.iter().skip(1).zip(results) {
        assert_eq!(result.unwrap(), first, "{:?} differs", strategy);
    }
    first
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_directories() {
    assert_same_result(ScanRequest::new(Vec::new()), 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_directories_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let request = ScanRequest::new(vec![
        temp_dir.path().join("nope"),
        temp_dir.path().join("still-nope"),
    ]);
    assert_same_result(request, 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_directory() {
    let temp_dir = TempDir::new().unwrap();
    let apps = temp_dir.path().join("apps");
    populate(&apps, 150);

    let files = assert_same_result(ScanRequest::new(vec![apps]), 150).await;
    assert_eq!(files["apps 7"].identifier, "apps-7.desktop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_directories() {
    let temp_dir = TempDir::new().unwrap();
    let mut directories: Vec<PathBuf> = Vec::new();
    for i in 0..12 {
        let dir = temp_dir.path().join(format!("dir{}", i));
        populate(&dir, i * 5);
        directories.push(dir);
    }
    directories.push(temp_dir.path().join("missing"));

    let expected = (0..12).map(|i| i * 5).sum();
    assert_same_result(ScanRequest::new(directories), expected).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_filters_are_applied() {
    let temp_dir = TempDir::new().unwrap();
    let apps = temp_dir.path().join("apps");
    populate(&apps, 3);
    write_entry(&apps, "link.desktop", "Name=Link\nType=Link\n");
    write_entry(&apps, "odd-link.desktop", "Name=OddLink\nType=Link\nHidden=maybe\n");
    write_entry(
        &apps,
        "odd-hidden.desktop",
        "Name=OddHidden\nType=Application\nNoDisplay=true\nHidden=maybe\n",
    );
    write_entry(&apps, "hidden.desktop", "Name=Hidden\nType=Application\nHidden=true\n");
    write_entry(&apps, "nodisplay.desktop", "Name=NoDisplay\nType=Application\nNoDisplay=true\n");
    write_entry(&apps, "kde.desktop", "Name=Kde\nType=Application\nOnlyShowIn=KDE;\n");
    write_entry(&apps, "gnome.desktop", "Name=Gnome\nType=Application\nOnlyShowIn=GNOME;\n");
    write_entry(&apps, "not-gnome.desktop", "Name=NotGnome\nType=Application\nNotShowIn=GNOME;\n");
    fs::write(apps.join("README"), "not a desktop file").unwrap();

    let request = ScanRequest::new(vec![apps])
        .with_blacklist(["apps-0.desktop"])
        .with_desktops(vec!["GNOME".to_string()]);
    let files = assert_same_result(request, 3).await;

    let mut names: Vec<_> = files.keys().cloned().collect();
    names.sort();
    assert_eq!(names, ["Gnome", "apps 1", "apps 2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_failing_directory_fails_every_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let mut directories = Vec::new();
    for i in 0..6 {
        let dir = temp_dir.path().join(format!("dir{}", i));
        populate(&dir, 40);
        directories.push(dir);
    }
    write_entry(&directories[3], "broken.desktop", "Name=Broken\nType=Application\nHidden=maybe\n");

    for result in scan_all(&ScanRequest::new(directories)).await {
        assert!(matches!(result, Err(LaunchError::DesktopFile { .. })));
    }
    assert_tasks_released().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_scan_releases_its_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let mut directories = Vec::new();
    for i in 0..4 {
        let dir = temp_dir.path().join(format!("dir{}", i));
        populate(&dir, 200);
        directories.push(dir);
    }
    let request = ScanRequest::new(directories);

    for strategy in STRATEGIES {
        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), strategy.scan(request.clone())).await;
        drop(abandoned);
        assert_tasks_released().await;
    }

    // the runtime is still usable afterwards
    assert_same_result(request, 800).await;
    assert_tasks_released().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_directory_fails_every_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let apps = temp_dir.path().join("apps");
    populate(&apps, 5);
    let file = temp_dir.path().join("plain-file");
    fs::write(&file, "").unwrap();

    for result in scan_all(&ScanRequest::new(vec![apps, file])).await {
        assert!(matches!(result, Err(LaunchError::NotADirectory(_))));
    }
    assert_tasks_released().await;
}
