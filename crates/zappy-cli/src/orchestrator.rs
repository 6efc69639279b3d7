//! Startup and shutdown sequencing for one `zappy` run
//!
//! 1. Load the settings file and merge command-line overrides
//! 2. Check the watch directory, provider and credentials
//! 3. Build the storage backend from the resolved configuration
//! 4. Optionally upload files missing from the bucket
//! 5. Watch the directory until a termination signal arrives
//! 6. Stop the watcher and wait for in-flight uploads
//!
//! Steps 1-2 are [`Orchestrator::validate`], which is synchronous so the
//! binary can run it before the async runtime starts. Steps 3-6 are
//! [`Orchestrator::serve`]. Every step moves the [`Lifecycle`] forward; a
//! failure before watching starts, or a watcher that dies on its own, moves
//! it to `Aborted`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zappy_core::config::{Config, ConfigOverrides, ResolvedConfig};
use zappy_core::domain::{Lifecycle, OrchestratorState, ReconcileReport};
use zappy_core::ports::{IObjectStore, IUploadObserver};
use zappy_core::usecases::{ReconcileUseCase, UploadFileUseCase};
use zappy_gcs::auth::CREDENTIALS_ENV;
use zappy_gcs::provider::GcsObjectStore;
use zappy_watch::scheduler::{DispatchStats, UploadScheduler};
use zappy_watch::watcher::{DirectoryWatcher, EventSource, WatchBackend};

/// Builds the storage backend once the configuration is known to be valid
pub type StoreFactory =
    Box<dyn Fn(&ResolvedConfig) -> Result<Arc<dyn IObjectStore>> + Send + Sync>;

/// Picks the watch backend for the resolved configuration
pub type WatcherFactory = Box<dyn Fn(&ResolvedConfig) -> Box<dyn EventSource> + Send + Sync>;

/// Factory for the Cloud Storage backend
pub fn gcs_store_factory() -> StoreFactory {
    Box::new(|resolved: &ResolvedConfig| -> Result<Arc<dyn IObjectStore>> {
        let store = GcsObjectStore::from_credentials_file(&resolved.credentials_path)
            .context("Failed to set up the GCS client")?;
        Ok(Arc::new(store) as Arc<dyn IObjectStore>)
    })
}

/// Factory for the `notify` directory watcher
pub fn directory_watcher_factory() -> WatcherFactory {
    Box::new(|resolved: &ResolvedConfig| -> Box<dyn EventSource> {
        Box::new(DirectoryWatcher::new(WatchBackend::from_poll_interval(
            resolved.poll_interval,
        )))
    })
}

/// Publishes the resolved credentials path as `GOOGLE_APPLICATION_CREDENTIALS`
///
/// Must run before any other thread is started; the binary calls it before
/// building the runtime.
pub fn export_credentials(resolved: &ResolvedConfig) {
    std::env::set_var(CREDENTIALS_ENV, &resolved.credentials_path);
}

/// What a completed run did
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Present when the startup scan ran
    pub reconcile: Option<ReconcileReport>,
    pub dispatch: DispatchStats,
}

/// Drives one run from validation to shutdown
pub struct Orchestrator {
    lifecycle: Lifecycle,
    observer: Arc<dyn IUploadObserver>,
    store_factory: StoreFactory,
    watcher_factory: WatcherFactory,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        observer: Arc<dyn IUploadObserver>,
        store_factory: StoreFactory,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            observer,
            store_factory,
            watcher_factory: directory_watcher_factory(),
            shutdown,
        }
    }

    /// Replaces the default `notify` watcher
    pub fn with_watcher_factory(mut self, watcher_factory: WatcherFactory) -> Self {
        self.watcher_factory = watcher_factory;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Validates, then serves until a termination signal
    ///
    /// # Errors
    /// See [`validate`](Self::validate) and [`serve`](Self::serve).
    pub async fn run(&mut self, config_path: &Path, overrides: &ConfigOverrides) -> Result<RunSummary> {
        let resolved = self.validate(config_path, overrides)?;
        self.serve(resolved).await
    }

    /// Loads the settings file and resolves it against `overrides`
    ///
    /// # Errors
    /// Any configuration or precondition failure. It has already been
    /// reported to the observer and the lifecycle is `Aborted`.
    pub fn validate(&mut self, config_path: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
        self.lifecycle.transition_to(OrchestratorState::Validating)?;
        match load_and_resolve(config_path, overrides) {
            Ok(resolved) => Ok(resolved),
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Builds the backend, runs the optional startup scan and watches until
    /// the shutdown token fires
    ///
    /// # Errors
    /// Backend or watcher setup failures, a failed startup scan, or an
    /// event stream that ends without a stop request. Each has been reported
    /// to the observer and the lifecycle is `Aborted`.
    pub async fn serve(&mut self, resolved: ResolvedConfig) -> Result<RunSummary> {
        let store = match (self.store_factory)(&resolved) {
            Ok(store) => store,
            Err(e) => return Err(self.abort(e)),
        };
        info!(
            provider = store.provider_name(),
            bucket = %resolved.bucket,
            project = %resolved.project_id,
            "Storage backend ready"
        );

        let handler = Arc::new(UploadFileUseCase::new(
            store,
            Arc::clone(&self.observer),
            resolved.bucket.clone(),
            resolved.dry_run,
        ));
        if resolved.dry_run {
            self.observer
                .on_status("Dry run: files will be checked but not uploaded.");
        }

        let mut summary = RunSummary::default();

        if resolved.upload_missing {
            self.lifecycle.transition_to(OrchestratorState::Reconciling)?;
            self.observer.on_status(&format!(
                "Uploading files in {} missing from {}...",
                resolved.watch_directory.display(),
                resolved.bucket
            ));

            let scan = ReconcileUseCase::new(Arc::clone(&handler), resolved.max_concurrent_uploads);
            let stop = self.shutdown.clone();
            let scanned = scan
                .run_until(&resolved.watch_directory, stop.cancelled())
                .await;
            let report = match scanned {
                Ok(report) => report,
                Err(e) => return Err(self.abort(e)),
            };
            summary.reconcile = Some(report);

            if self.shutdown.is_cancelled() {
                info!("Signal received during startup scan");
                self.lifecycle
                    .transition_to(OrchestratorState::StoppingOnSignal)?;
                self.lifecycle.transition_to(OrchestratorState::Terminated)?;
                return Ok(summary);
            }
        }

        let mut watcher = (self.watcher_factory)(&resolved);
        let events = match watcher.start(&resolved.watch_directory) {
            Ok(events) => events,
            Err(e) => return Err(self.abort(e.into())),
        };
        self.lifecycle.transition_to(OrchestratorState::Watching)?;

        self.observer.on_status(&format!(
            "Monitoring {} for new files to upload to {}...",
            resolved.watch_directory.display(),
            resolved.bucket
        ));
        self.observer
            .on_status("Observer started. Press Ctrl+C to exit.");

        let mut scheduler = UploadScheduler::new(
            handler,
            resolved.max_concurrent_uploads,
            resolved.settle_delay,
        );
        scheduler.run(events, self.shutdown.clone()).await;

        if !self.shutdown.is_cancelled() {
            warn!("Watcher event stream ended without a stop request");
            watcher.stop();
            summary.dispatch = scheduler.drain().await;
            let err = anyhow!(
                "Stopped watching {}: the watcher ended unexpectedly",
                resolved.watch_directory.display()
            );
            return Err(self.abort(err));
        }

        self.lifecycle
            .transition_to(OrchestratorState::StoppingOnSignal)?;
        self.observer.on_status("Stopping observer...");
        watcher.stop();
        summary.dispatch = scheduler.drain().await;

        self.lifecycle.transition_to(OrchestratorState::Terminated)?;
        info!(
            dispatched = summary.dispatch.dispatched,
            failed = summary.dispatch.failed,
            "Shut down cleanly"
        );
        Ok(summary)
    }

    /// Reports `err`, moves to `Aborted` and hands the error back
    fn abort(&mut self, err: anyhow::Error) -> anyhow::Error {
        error!(error = %format!("{err:#}"), state = %self.lifecycle.state(), "Run aborted");
        self.observer.on_error(&format!("{err:#}"));
        if let Err(e) = self.lifecycle.transition_to(OrchestratorState::Aborted) {
            warn!(error = %e, "Lifecycle already finished");
        }
        err
    }
}

/// Loads the settings file (creating it with defaults if absent) and
/// resolves it against the command-line overrides
fn load_and_resolve(config_path: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let config = Config::load_or_create(config_path)?;
    let config_dir = config_path.parent();
    Ok(config.resolve(overrides, config_dir)?)
}
