//! Runs the daemon from the CLI process.

use std::ffi::OsString;

use spicetifyd::{ArgsConfigLoader, LaunchError, ShutdownReason};

/// Starts a daemon and blocks until it stops.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait DaemonLauncher {
    /// Runs the daemon configured by `config_arguments`.
    fn start(&self, config_arguments: Vec<OsString>) -> Result<ShutdownReason, LaunchError>;
}

/// Runs the daemon on a runtime owned by the current process.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct InProcessDaemon;

impl DaemonLauncher for InProcessDaemon {
    fn start(&self, config_arguments: Vec<OsString>) -> Result<ShutdownReason, LaunchError> {
        spicetifyd::run_daemon_with(ArgsConfigLoader::new(config_arguments))
    }
}
