//! Upload scheduler - dispatches watcher events to the upload handler
//!
//! The [`UploadScheduler`] sits between the
//! [`DirectoryWatcher`](super::watcher::DirectoryWatcher) and the
//! [`UploadFileUseCase`]. It receives file events, waits for a free
//! dispatch permit and runs the handler on its own task.
//!
//! ## Flow
//!
//! ```text
//! DirectoryWatcher ──→ mpsc::Receiver ──→ UploadScheduler ──→ JoinSet<handler task>
//!                                             │
//!                                        Semaphore (max concurrent uploads)
//! ```
//!
//! With one permit (the default) events are handled strictly one at a time,
//! in arrival order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use zappy_core::domain::FileEvent;
use zappy_core::usecases::UploadFileUseCase;

use crate::watcher::wait_until_settled;

/// Size checks performed before a file is declared unsettled
const SETTLE_MAX_ROUNDS: u32 = 30;

/// Counters for one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events handed to a handler task
    pub dispatched: u64,
    /// Tasks that ended with an outcome (or an ignored directory)
    pub completed: u64,
    /// Tasks that ended with an error
    pub failed: u64,
}

/// Dispatches file events to the upload handler under a concurrency limit
pub struct UploadScheduler {
    handler: Arc<UploadFileUseCase>,
    permits: Arc<Semaphore>,
    settle_delay: Option<Duration>,
    tasks: JoinSet<bool>,
    stats: DispatchStats,
}

impl UploadScheduler {
    /// Creates a new `UploadScheduler`
    ///
    /// # Arguments
    /// * `handler` - Upload handler shared by every task
    /// * `max_concurrent` - Number of events processed at once (at least 1)
    /// * `settle_delay` - Interval for the settle check, `None` to skip it
    pub fn new(
        handler: Arc<UploadFileUseCase>,
        max_concurrent: usize,
        settle_delay: Option<Duration>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        info!(
            max_concurrent,
            settle_ms = settle_delay.map(|d| d.as_millis() as u64).unwrap_or(0),
            "Creating upload scheduler"
        );

        Self {
            handler,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            settle_delay,
            tasks: JoinSet::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Main event loop
    ///
    /// Runs until `cancel` fires or the event channel closes. Handler tasks
    /// still running when this returns are awaited by [`drain`](Self::drain).
    pub async fn run(&mut self, mut events: mpsc::Receiver<FileEvent>, cancel: CancellationToken) {
        info!("Upload scheduler starting");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Stop requested, no longer accepting events");
                    break;
                }

                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if !self.dispatch(event, &cancel).await {
                                break;
                            }
                        }
                        None => {
                            info!("Event channel closed, scheduler shutting down");
                            break;
                        }
                    }
                }
            }

            self.reap_finished();
        }
    }

    /// Waits for a permit and spawns the handler task for `event`
    ///
    /// Returns `false` if cancelled while waiting for a permit.
    async fn dispatch(&mut self, event: FileEvent, cancel: &CancellationToken) -> bool {
        debug!(path = %event.path().display(), is_directory = event.is_directory, "Dispatching event");

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let handler = Arc::clone(&self.handler);
        let settle_delay = self.settle_delay;
        self.tasks.spawn(async move {
            let _permit = permit;

            if let (Some(interval), false) = (settle_delay, event.is_directory) {
                if let Err(e) = wait_until_settled(event.path(), interval, SETTLE_MAX_ROUNDS).await {
                    handler.report_failure(event.path(), &e);
                    return false;
                }
            }

            handler.handle(&event).await.is_ok()
        });
        self.stats.dispatched += 1;
        true
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: Result<bool, tokio::task::JoinError>) {
        match joined {
            Ok(true) => self.stats.completed += 1,
            Ok(false) => self.stats.failed += 1,
            Err(e) => {
                error!(error = %e, "Upload task panicked");
                self.stats.failed += 1;
            }
        }
    }

    /// Awaits every in-flight handler task and returns the run's counters
    pub async fn drain(&mut self) -> DispatchStats {
        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight uploads to finish");
        }
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
        info!(
            dispatched = self.stats.dispatched,
            completed = self.stats.completed,
            failed = self.stats.failed,
            "Upload scheduler stopped"
        );
        self.stats
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}

// ============================================================================
// Unit tests
// ============================================================================
