//! Daemon launch sequencing and runtime orchestration.
//!
//! The runtime binds the HTTP surface, starts the apps watcher and follows
//! the configuration file. Each change to the file publishes a new settings
//! snapshot; a changed data path restarts the apps watcher (waiting for the
//! old one to stop first), and `daemon = false` shuts the daemon down.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind};
use ortho_config::{OrthoConfig, OrthoError};
use spicetify_config::{Config, config_file, with_default_config_file};
use thiserror::Error;
use tracing::{debug, warn};

use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::inject::{Injector, SpaInjector};
use crate::proxy::{ProxyTransport, UreqTransport};
use crate::server::{DaemonState, HttpListener, ServerError};
use crate::settings::SettingsCell;
use crate::telemetry::{self, TelemetryError};
use crate::watcher::{self, EventStream, WatchError, WatcherHandle, watch_path};

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Why the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The configuration set `daemon = false`.
    Disabled,
    /// An interrupt or termination signal arrived.
    Signal,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Signal => "signal",
        })
    }
}

/// Errors surfaced while launching or running the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The async runtime could not be built.
    #[error("failed to build async runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The HTTP surface failed.
    #[error("daemon HTTP server failed: {source}")]
    Server {
        /// Underlying server error.
        #[source]
        source: ServerError,
    },
    /// The HTTP server task ended unexpectedly.
    #[error("daemon HTTP server task failed: {source}")]
    ServerTask {
        /// Join error reported by tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ServerError> for LaunchError {
    fn from(source: ServerError) -> Self {
        Self::Server { source }
    }
}

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;

    /// File whose changes trigger a reload.
    fn config_file(&self) -> PathBuf;
}

/// Loader replaying the process's configuration flags.
///
/// The default config file is looked up again on every load, so a file
/// created after startup is picked up by the next reload.
#[derive(Debug, Clone)]
pub struct ArgsConfigLoader {
    args: Vec<OsString>,
}

impl ArgsConfigLoader {
    /// Builds a loader from the program name and configuration flags.
    #[must_use]
    pub fn new(args: Vec<OsString>) -> Self {
        Self { args }
    }
}

impl ConfigLoader for ArgsConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(with_default_config_file(self.args.clone()))
    }

    fn config_file(&self) -> PathBuf {
        config_file(&self.args)
    }
}

/// Collaborators of the running daemon.
#[derive(Clone)]
pub struct Services {
    /// Re-applies the vault after host updates.
    pub injector: Arc<dyn Injector>,
    /// Upstream transport of the proxy.
    pub transport: Arc<dyn ProxyTransport>,
    /// Lifecycle observer.
    pub reporter: Arc<dyn HealthReporter>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            injector: Arc::new(SpaInjector),
            transport: Arc::new(UreqTransport::new()),
            reporter: Arc::new(StructuredHealthReporter::new()),
        }
    }
}

/// Runs the daemon with the process's arguments until it is told to stop.
pub fn run_daemon() -> Result<ShutdownReason, LaunchError> {
    let split = spicetify_config::split_config_arguments(&std::env::args_os().collect::<Vec<_>>());
    run_daemon_with(ArgsConfigLoader::new(split.config_arguments))
}

/// Loads configuration, installs telemetry and drives the daemon on a new
/// multi-threaded runtime.
pub fn run_daemon_with<L>(loader: L) -> Result<ShutdownReason, LaunchError>
where
    L: ConfigLoader + 'static,
{
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| LaunchError::Runtime { source })?;
    runtime.block_on(run(loader, config, Services::default(), wait_for_signal()))
}

/// Drives the daemon until `shutdown` resolves or the configuration
/// disables it.
pub async fn run<L, S>(
    loader: L,
    config: Config,
    services: Services,
    shutdown: S,
) -> Result<ShutdownReason, LaunchError>
where
    L: ConfigLoader,
    S: Future<Output = ()>,
{
    let reporter = Arc::clone(&services.reporter);
    reporter.daemon_starting(&config.daemon_addr);
    let settings = Arc::new(SettingsCell::new(&config));

    let listener = HttpListener::bind(&config.daemon_addr).await?;
    let local_addr = listener.local_addr();
    let mut server = listener.serve(DaemonState::new(
        Arc::clone(&settings),
        Arc::clone(&services.transport),
    ));

    let config_path = loader.config_file();
    let mut config_events = watch_config(&config_path);
    let mut apps_watcher = start_apps_watcher(&settings, &services);
    reporter.daemon_ready(local_addr);

    tokio::pin!(shutdown);
    let outcome = loop {
        tokio::select! {
            () = &mut shutdown => break Ok(ShutdownReason::Signal),
            finished = &mut server => break Err(match finished {
                Ok(Ok(())) => LaunchError::Server {
                    source: ServerError::Serve {
                        source: io::Error::other("listener closed"),
                    },
                },
                Ok(Err(source)) => LaunchError::Server { source },
                Err(source) => LaunchError::ServerTask { source },
            }),
            event = next_event(&mut config_events) => {
                if !touches(&event, &config_path) {
                    continue;
                }
                let Some(daemon) = reload(&loader, &settings, &services, &mut apps_watcher).await
                else {
                    continue;
                };
                if !daemon {
                    break Ok(ShutdownReason::Disabled);
                }
            }
        }
    };

    if let Ok(reason) = &outcome {
        reporter.shutdown_requested(*reason);
    }
    stop_apps_watcher(apps_watcher.take()).await;
    server.abort();
    outcome
}

/// Reloads the configuration and returns the new `daemon` flag, or `None`
/// when the file could not be loaded.
async fn reload<L: ConfigLoader>(
    loader: &L,
    settings: &Arc<SettingsCell>,
    services: &Services,
    apps_watcher: &mut Option<WatcherHandle>,
) -> Option<bool> {
    let config = match loader.load() {
        Ok(config) => config,
        Err(error) => {
            warn!(target: RUNTIME_TARGET, %error, "ignoring unreadable configuration");
            return None;
        }
    };
    let previous = settings.load();
    let current = settings.publish(&config);
    services.reporter.config_reloaded(current.generation());

    if current.spotify_data_path != previous.spotify_data_path {
        stop_apps_watcher(apps_watcher.take()).await;
        *apps_watcher = start_apps_watcher(settings, services);
    }
    Some(current.daemon)
}

fn start_apps_watcher(settings: &Arc<SettingsCell>, services: &Services) -> Option<WatcherHandle> {
    watcher::spawn(
        Arc::clone(settings),
        Arc::clone(&services.injector),
        Arc::clone(&services.reporter),
    )
    .map_err(|error| warn!(target: RUNTIME_TARGET, %error, "apps watcher not started"))
    .ok()
}

async fn stop_apps_watcher(handle: Option<WatcherHandle>) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(error) = handle.stop().await {
        warn!(target: RUNTIME_TARGET, %error, "apps watcher did not stop cleanly");
    }
}

/// Watches the folder holding the config file so that replacements by
/// editors are seen too.
fn watch_config(path: &std::path::Path) -> Option<EventStream> {
    let folder = path.parent()?;
    watch_path(folder)
        .map_err(|error: WatchError| {
            warn!(target: RUNTIME_TARGET, %error, "configuration changes will not be followed");
        })
        .ok()
}

/// Next configuration folder event; pends forever once the stream is gone.
async fn next_event(stream: &mut Option<EventStream>) -> notify::Result<Event> {
    if let Some(active) = stream
        && let Some(event) = active.events.recv().await
    {
        return event;
    }
    *stream = None;
    std::future::pending().await
}

fn touches(event: &notify::Result<Event>, config_path: &std::path::Path) -> bool {
    match event {
        Ok(event) => {
            debug!(target: RUNTIME_TARGET, ?event, "configuration folder event");
            let relevant = match event.kind {
                EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
                EventKind::Access(_) => false,
                _ => true,
            };
            relevant
                && event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == config_path.file_name())
        }
        Err(error) => {
            warn!(target: RUNTIME_TARGET, %error, "configuration watcher error");
            false
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(error) => warn!(target: RUNTIME_TARGET, %error, "SIGTERM handler not installed"),
        }
    }
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(target: RUNTIME_TARGET, %error, "Ctrl-C handler not installed");
        std::future::pending::<()>().await;
    }
}
