//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use camino::Utf8Path;
use spicetify_vault::inject::InjectError;

use crate::runtime::ShutdownReason;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked once configuration and telemetry are ready.
    fn daemon_starting(&self, addr: &str);

    /// Invoked after the HTTP listener is bound.
    fn daemon_ready(&self, addr: SocketAddr);

    /// Invoked when the apps watcher starts observing a folder.
    fn watcher_started(&self, path: &Utf8Path);

    /// Invoked after the apps watcher loop has exited.
    fn watcher_stopped(&self, path: &Utf8Path);

    /// Invoked after a host bundle was re-injected.
    fn injection_succeeded(&self, destination: &Path);

    /// Invoked when re-injection fails.
    fn injection_failed(&self, error: &InjectError);

    /// Invoked after a new settings snapshot is published.
    fn config_reloaded(&self, generation: u64);

    /// Invoked when the daemon begins shutting down.
    fn shutdown_requested(&self, reason: ShutdownReason);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn daemon_starting(&self, addr: &str) {
        (**self).daemon_starting(addr);
    }

    fn daemon_ready(&self, addr: SocketAddr) {
        (**self).daemon_ready(addr);
    }

    fn watcher_started(&self, path: &Utf8Path) {
        (**self).watcher_started(path);
    }

    fn watcher_stopped(&self, path: &Utf8Path) {
        (**self).watcher_stopped(path);
    }

    fn injection_succeeded(&self, destination: &Path) {
        (**self).injection_succeeded(destination);
    }

    fn injection_failed(&self, error: &InjectError) {
        (**self).injection_failed(error);
    }

    fn config_reloaded(&self, generation: u64) {
        (**self).config_reloaded(generation);
    }

    fn shutdown_requested(&self, reason: ShutdownReason) {
        (**self).shutdown_requested(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn daemon_starting(&self, addr: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "daemon_starting",
            addr,
            "starting daemon"
        );
    }

    fn daemon_ready(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "daemon_ready",
            addr = %addr,
            "daemon listening"
        );
    }

    fn watcher_started(&self, path: &Utf8Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "watcher_started",
            path = %path,
            "watching host apps folder"
        );
    }

    fn watcher_stopped(&self, path: &Utf8Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "watcher_stopped",
            path = %path,
            "apps watcher stopped"
        );
    }

    fn injection_succeeded(&self, destination: &Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "injection_succeeded",
            destination = %destination.display(),
            "host bundle re-injected"
        );
    }

    fn injection_failed(&self, error: &InjectError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "injection_failed",
            error = %error,
            "host bundle injection failed"
        );
    }

    fn config_reloaded(&self, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "config_reloaded",
            generation,
            "configuration reloaded"
        );
    }

    fn shutdown_requested(&self, reason: ShutdownReason) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            reason = %reason,
            "daemon shutting down"
        );
    }
}
