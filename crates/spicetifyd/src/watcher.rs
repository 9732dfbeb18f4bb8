//! Watches the host's `Apps` folder and re-injects when the host restores
//! its bundle, which it does on every self-update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use camino::Utf8PathBuf;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use spicetify_vault::inject::BUNDLE_FILE;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::health::HealthReporter;
use crate::inject::Injector;
use crate::settings::SettingsCell;

const WATCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watcher");

/// Errors raised while starting or stopping a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The filesystem watch could not be registered.
    #[error("failed to watch '{path}': {source}")]
    Notify {
        /// Watched path.
        path: PathBuf,
        /// Underlying notify error.
        #[source]
        source: notify::Error,
    },
    /// The watcher task panicked or was aborted.
    #[error("watcher task failed: {source}")]
    Join {
        /// Join error reported by tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Filesystem event stream for a single path.
pub(crate) struct EventStream {
    // Dropping the watcher ends the stream.
    _watcher: RecommendedWatcher,
    pub(crate) events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

/// Registers a non-recursive watch on `path`.
pub(crate) fn watch_path(path: &Path) -> Result<EventStream, WatchError> {
    let notify_error = |source| WatchError::Notify {
        path: path.to_path_buf(),
        source,
    };
    let (sender, events) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        if sender.send(event).is_err() {
            debug!(target: WATCHER_TARGET, "event receiver closed");
        }
    })
    .map_err(notify_error)?;
    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(notify_error)?;
    Ok(EventStream {
        _watcher: watcher,
        events,
    })
}

/// Handle to a running apps watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    path: Utf8PathBuf,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Folder being watched.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// Cancels the watcher and waits until its loop has exited.
    pub async fn stop(self) -> Result<(), WatchError> {
        self.token.cancel();
        self.task
            .await
            .map_err(|source| WatchError::Join { source })
    }
}

/// Starts watching the `Apps` folder named by the current settings.
///
/// Must be called from within a tokio runtime.
pub fn spawn(
    settings: Arc<SettingsCell>,
    injector: Arc<dyn Injector>,
    reporter: Arc<dyn HealthReporter>,
) -> Result<WatcherHandle, WatchError> {
    let path = settings.load().apps_path();
    let stream = watch_path(path.as_std_path())?;
    reporter.watcher_started(&path);

    let token = CancellationToken::new();
    let task = tokio::spawn(run(
        stream,
        token.clone(),
        WatchContext {
            path: path.clone(),
            settings,
            injector,
            reporter,
        },
    ));
    Ok(WatcherHandle { path, token, task })
}

struct WatchContext {
    path: Utf8PathBuf,
    settings: Arc<SettingsCell>,
    injector: Arc<dyn Injector>,
    reporter: Arc<dyn HealthReporter>,
}

async fn run(mut stream: EventStream, token: CancellationToken, context: WatchContext) {
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            event = stream.events.recv() => match event {
                Some(Ok(event)) => {
                    debug!(target: WATCHER_TARGET, ?event, "apps folder event");
                    if creates_bundle(&event) {
                        reinject(&context).await;
                    }
                }
                Some(Err(error)) => {
                    warn!(target: WATCHER_TARGET, %error, "apps watcher error");
                }
                None => break,
            },
        }
    }
    drop(stream);
    context.reporter.watcher_stopped(&context.path);
}

async fn reinject(context: &WatchContext) {
    let settings = context.settings.load();
    let injector = Arc::clone(&context.injector);
    match tokio::task::spawn_blocking(move || injector.inject(&settings)).await {
        Ok(Ok(destination)) => context.reporter.injection_succeeded(&destination),
        Ok(Err(error)) => context.reporter.injection_failed(&error),
        Err(error) => warn!(target: WATCHER_TARGET, %error, "injection task failed"),
    }
}

/// True for a newly created (or moved-in) `xpui.spa`.
fn creates_bundle(event: &Event) -> bool {
    let created = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    );
    created
        && event
            .paths
            .iter()
            .any(|path| path.file_name().is_some_and(|name| name == BUNDLE_FILE))
}
