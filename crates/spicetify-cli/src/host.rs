//! Starts the host application outside the process.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Launches the host executable.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait HostLauncher {
    /// Starts `program` with `arguments` without waiting for it to exit.
    fn launch(&self, program: &Path, arguments: &[OsString]) -> io::Result<()>;
}

/// Launcher that spawns a detached child with its standard streams closed.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DetachedHost;

impl HostLauncher for DetachedHost {
    fn launch(&self, program: &Path, arguments: &[OsString]) -> io::Result<()> {
        Command::new(program)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }
}
