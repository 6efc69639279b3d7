//! Watcher → scheduler → handler, against a real directory

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zappy_core::domain::UploadOutcome;
use zappy_core::usecases::UploadFileUseCase;
use zappy_watch::scheduler::UploadScheduler;
use zappy_watch::watcher::{DirectoryWatcher, WatchBackend};

use crate::common::{MemoryBucket, Recorder};

const POLL: Duration = Duration::from_millis(50);

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_new_file_is_uploaded_while_watching() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bucket = Arc::new(MemoryBucket::default());
    let recorder = Arc::new(Recorder::default());
    let handler = Arc::new(UploadFileUseCase::new(
        bucket.clone(),
        recorder.clone(),
        "zappy",
        false,
    ));

    let mut watcher = DirectoryWatcher::new(WatchBackend::Poll(POLL));
    let events = watcher.start(tmp.path()).unwrap();
    let cancel = CancellationToken::new();
    let mut scheduler = UploadScheduler::new(handler, 1, None);

    let loop_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        scheduler.run(events, loop_cancel).await;
        scheduler
    });

    std::fs::write(tmp.path().join("c.txt"), b"hello").unwrap();
    assert!(wait_for(|| bucket.contains("c.txt")).await);

    cancel.cancel();
    let mut scheduler = run.await.unwrap();
    watcher.stop();
    let stats = scheduler.drain().await;

    assert!(stats.completed >= 1);
    assert_eq!(*bucket.uploads.lock().unwrap(), vec!["c.txt".to_string()]);
    let outcomes = recorder.outcomes.lock().unwrap();
    assert!(outcomes
        .iter()
        .any(|(p, o)| p.ends_with("c.txt") && *o == UploadOutcome::Uploaded));
}

#[tokio::test]
async fn test_dry_run_watch_never_uploads() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bucket = Arc::new(MemoryBucket::default());
    let recorder = Arc::new(Recorder::default());
    let handler = Arc::new(UploadFileUseCase::new(
        bucket.clone(),
        recorder.clone(),
        "zappy",
        true,
    ));

    let mut watcher = DirectoryWatcher::new(WatchBackend::Poll(POLL));
    let events = watcher.start(tmp.path()).unwrap();
    let cancel = CancellationToken::new();
    let mut scheduler = UploadScheduler::new(handler, 1, None);

    let loop_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        scheduler.run(events, loop_cancel).await;
        scheduler
    });

    std::fs::write(tmp.path().join("d.txt"), b"draft").unwrap();
    let seen = {
        let recorder = recorder.clone();
        wait_for(move || !recorder.outcomes.lock().unwrap().is_empty()).await
    };
    assert!(seen);

    cancel.cancel();
    let mut scheduler = run.await.unwrap();
    watcher.stop();
    scheduler.drain().await;

    assert!(bucket.uploads.lock().unwrap().is_empty());
    let outcomes = recorder.outcomes.lock().unwrap();
    assert_eq!(outcomes[0].1, UploadOutcome::WouldUpload);
}

#[tokio::test]
async fn test_subdirectory_creation_uploads_nothing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bucket = Arc::new(MemoryBucket::default());
    let handler = Arc::new(UploadFileUseCase::new(
        bucket.clone(),
        Arc::new(Recorder::default()),
        "zappy",
        false,
    ));

    let mut watcher = DirectoryWatcher::new(WatchBackend::Poll(POLL));
    let events = watcher.start(tmp.path()).unwrap();
    let cancel = CancellationToken::new();
    let mut scheduler = UploadScheduler::new(handler, 1, None);

    let loop_cancel = cancel.clone();
    let run = tokio::spawn(async move {
        scheduler.run(events, loop_cancel).await;
        scheduler
    });

    std::fs::create_dir(tmp.path().join("sub")).unwrap();
    tokio::time::sleep(POLL * 6).await;

    cancel.cancel();
    let mut scheduler = run.await.unwrap();
    watcher.stop();
    let stats = scheduler.drain().await;

    assert_eq!(stats.failed, 0);
    assert!(bucket.uploads.lock().unwrap().is_empty());
}
