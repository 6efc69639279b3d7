//! Directory watching
//!
//! Provides a [`DirectoryWatcher`] that wraps the `notify` crate to monitor
//! one directory (non-recursively) for new entries, converting raw OS events
//! into [`FileEvent`] values.
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents / poll thread
//!       │
//!       ▼
//!  DirectoryWatcher  ──→  mpsc::channel  ──→  UploadScheduler
//! ```
//!
//! The backend is chosen by [`WatchBackend`]: the platform's recommended
//! watcher, or a polling watcher when configured or when the native one
//! cannot be set up. Nothing downstream depends on which one runs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zappy_core::domain::{FileEvent, UploadError};

use crate::WatchError;

/// Capacity of the channel between the OS watcher and the event loop
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Poll interval used when the native watcher is unavailable
pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(1000);

// ============================================================================
// Backend selection
// ============================================================================

/// Which `notify` backend watches the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchBackend {
    /// The platform's recommended watcher (inotify, FSEvents, ...)
    Native,
    /// Periodic directory scans at the given interval
    Poll(Duration),
}

impl WatchBackend {
    /// Native unless a poll interval is configured
    pub fn from_poll_interval(interval: Option<Duration>) -> Self {
        match interval {
            Some(interval) => Self::Poll(interval),
            None => Self::Native,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Poll(_) => "poll",
        }
    }
}

// ============================================================================
// EventSource
// ============================================================================

/// A subscription delivering creation events for one directory
///
/// [`DirectoryWatcher`] is the production implementation; callers that only
/// need `start`/`stop` take a `Box<dyn EventSource>`.
pub trait EventSource: Send {
    /// Starts the subscription and returns the event receiver
    fn start(&mut self, directory: &Path) -> Result<mpsc::Receiver<FileEvent>, WatchError>;

    /// Releases the subscription; the receiver closes afterwards
    fn stop(&mut self);
}

// ============================================================================
// DirectoryWatcher
// ============================================================================

/// Watches a single directory for created entries
///
/// ## Usage
///
/// ```ignore
/// let mut watcher = DirectoryWatcher::new(WatchBackend::Native);
/// let mut rx = watcher.start(Path::new("/srv/drop"))?;
/// // rx.recv().await to get events
/// watcher.stop(); // releases the OS watch and closes the channel
/// ```
pub struct DirectoryWatcher {
    /// Requested backend
    backend: WatchBackend,
    /// The running notify watcher, if started
    inner: Option<Box<dyn Watcher + Send>>,
    /// Backend actually in use after any fallback
    active_backend: Option<WatchBackend>,
    /// Directory being watched
    directory: Option<PathBuf>,
}

impl DirectoryWatcher {
    pub fn new(backend: WatchBackend) -> Self {
        Self {
            backend,
            inner: None,
            active_backend: None,
            directory: None,
        }
    }

    /// Starts watching `directory` and returns the event receiver
    ///
    /// The receiver yields one [`FileEvent`] per creation, in the order the
    /// OS reports them, until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    /// Returns an error if no backend can watch the directory, or if the
    /// watcher is already running.
    pub fn start(&mut self, directory: &Path) -> Result<mpsc::Receiver<FileEvent>, WatchError> {
        if let Some(current) = &self.directory {
            return Err(WatchError::AlreadyRunning(current.clone()));
        }

        let (tx, rx) = mpsc::channel::<FileEvent>(EVENT_CHANNEL_CAPACITY);

        let (watcher, backend) = match self.backend {
            WatchBackend::Native => match watch_native(directory, tx.clone()) {
                Ok(w) => (w, WatchBackend::Native),
                Err(e) => {
                    warn!(
                        path = %directory.display(),
                        error = %e,
                        "Native watcher unavailable, falling back to polling"
                    );
                    let backend = WatchBackend::Poll(FALLBACK_POLL_INTERVAL);
                    (watch_poll(directory, tx, FALLBACK_POLL_INTERVAL)?, backend)
                }
            },
            WatchBackend::Poll(interval) => (
                watch_poll(directory, tx, interval)?,
                WatchBackend::Poll(interval),
            ),
        };

        info!(
            path = %directory.display(),
            backend = backend.name(),
            "Watching directory"
        );

        self.inner = Some(watcher);
        self.active_backend = Some(backend);
        self.directory = Some(directory.to_path_buf());
        Ok(rx)
    }

    /// Stops watching and releases the OS watch
    ///
    /// The event channel closes once the notify thread has let go of its
    /// sender; events already queued stay readable until then.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.inner.take() {
            if let Some(directory) = &self.directory {
                if let Err(e) = watcher.unwatch(directory) {
                    debug!(error = %e, "Unwatch failed, dropping watcher anyway");
                }
            }
            drop(watcher);
            info!("Directory watcher stopped");
        }
        self.directory = None;
        self.active_backend = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }

    /// Backend in use, after any fallback
    pub fn active_backend(&self) -> Option<WatchBackend> {
        self.active_backend
    }
}

impl EventSource for DirectoryWatcher {
    fn start(&mut self, directory: &Path) -> Result<mpsc::Receiver<FileEvent>, WatchError> {
        DirectoryWatcher::start(self, directory)
    }

    fn stop(&mut self) {
        DirectoryWatcher::stop(self);
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Callback run on the notify thread for every raw event
fn event_handler(
    tx: mpsc::Sender<FileEvent>,
) -> impl FnMut(notify::Result<notify::Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            if let Some(file_event) = map_notify_event(&event) {
                if let Err(e) = tx.blocking_send(file_event) {
                    warn!(error = %e, "Failed to send file event (receiver dropped)");
                }
            }
        }
        Err(err) => {
            error!(error = %err, "File watcher error");
        }
    }
}

fn watch_native(
    directory: &Path,
    tx: mpsc::Sender<FileEvent>,
) -> Result<Box<dyn Watcher + Send>, WatchError> {
    let setup = |source| WatchError::Setup {
        path: directory.to_path_buf(),
        source,
    };
    let mut watcher =
        RecommendedWatcher::new(event_handler(tx), notify::Config::default()).map_err(setup)?;
    watcher
        .watch(directory, RecursiveMode::NonRecursive)
        .map_err(setup)?;
    Ok(Box::new(watcher))
}

fn watch_poll(
    directory: &Path,
    tx: mpsc::Sender<FileEvent>,
    interval: Duration,
) -> Result<Box<dyn Watcher + Send>, WatchError> {
    let setup = |source| WatchError::Setup {
        path: directory.to_path_buf(),
        source,
    };
    let config = notify::Config::default().with_poll_interval(interval);
    let mut watcher = PollWatcher::new(event_handler(tx), config).map_err(setup)?;
    watcher
        .watch(directory, RecursiveMode::NonRecursive)
        .map_err(setup)?;
    Ok(Box::new(watcher))
}

// ============================================================================
// Event mapping - notify::Event → FileEvent
// ============================================================================

/// Converts a `notify::Event` into a [`FileEvent`]
///
/// - `Create(Folder)` -> directory event
/// - `Create(File)` -> file event
/// - `Create(Any | Other)` -> file or directory, decided by looking at the path
/// - `Modify(Name(To))` -> treated like `Create(Any)`; the entry is new here
///
/// Everything else (writes, removals, access) yields `None`.
pub fn map_notify_event(event: &notify::Event) -> Option<FileEvent> {
    let path = event.paths.first()?;

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => {
            debug!(path = %path.display(), "Mapped Create(Folder) event");
            Some(FileEvent::directory(path.clone()))
        }
        EventKind::Create(CreateKind::File) => {
            debug!(path = %path.display(), "Mapped Create(File) event");
            Some(FileEvent::file(path.clone()))
        }
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            debug!(path = %path.display(), kind = ?event.kind, "Mapped creation event");
            Some(classify(path))
        }
        _ => None,
    }
}

fn classify(path: &Path) -> FileEvent {
    if path.is_dir() {
        FileEvent::directory(path.to_path_buf())
    } else {
        FileEvent::file(path.to_path_buf())
    }
}

// ============================================================================
// Settle check
// ============================================================================

/// Waits until a file's size stops changing
///
/// Reads the size, sleeps `interval`, and reads it again, up to
/// `max_rounds` times. Returns the settled size.
///
/// # Errors
/// [`UploadError::Vanished`] if the file disappears, [`UploadError::Unsettled`]
/// if it is still growing after the last round.
pub async fn wait_until_settled(
    path: &Path,
    interval: Duration,
    max_rounds: u32,
) -> Result<u64, UploadError> {
    let mut previous = file_size(path).await?;

    for round in 1..=max_rounds {
        tokio::time::sleep(interval).await;
        let current = file_size(path).await?;
        if current == previous {
            debug!(path = %path.display(), size = current, round, "File settled");
            return Ok(current);
        }
        debug!(
            path = %path.display(),
            previous,
            current,
            round,
            "File still changing"
        );
        previous = current;
    }

    warn!(path = %path.display(), max_rounds, "File did not settle");
    Err(UploadError::Unsettled(path.to_path_buf()))
}

async fn file_size(path: &Path) -> Result<u64, UploadError> {
    match tokio::fs::metadata(path).await {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(UploadError::Vanished(path.to_path_buf())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read file metadata");
            Err(UploadError::Backend(
                zappy_core::domain::BackendError::LocalFile {
                    path: path.to_path_buf(),
                    source: e,
                },
            ))
        }
    }
}
