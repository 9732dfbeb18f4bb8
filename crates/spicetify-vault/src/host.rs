//! Chores on the host executable: its update endpoint and launch arguments.
//!
//! The host checks for self-updates against a URL embedded in its
//! executable. Overwriting the path segment after `desktop-update/` with a
//! same-length string points the check at a dead endpoint; writing the
//! original segment back restores it. The file length never changes.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use spicetify_config::Config;
use thiserror::Error;
use tracing::info;

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

const UPDATE_MARKER: &[u8] = b"desktop-update/";
const UPDATES_ON: &[u8] = b"v2/update";
const UPDATES_OFF: &[u8] = b"no/thanks";

const APP_DIRECTORY_FLAG: &str = "--app-directory=";

/// Errors raised while patching the host executable.
#[derive(Debug, Error)]
pub enum HostError {
    /// The executable could not be read or written.
    #[error("IO error at '{path}': {source}")]
    Io {
        /// Executable path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The executable does not embed an update endpoint.
    #[error("can't find the update endpoint in '{path}'")]
    MissingUpdateEndpoint {
        /// Executable path.
        path: PathBuf,
    },
}

/// Points the executable's update endpoint at the live path when `enabled`,
/// at a dead one otherwise.
pub fn set_updates(executable: &Path, enabled: bool) -> Result<(), HostError> {
    let io_error = |source| HostError::Io {
        path: executable.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(executable)
        .map_err(io_error)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).map_err(io_error)?;

    let replacement = if enabled { UPDATES_ON } else { UPDATES_OFF };
    let offset = endpoint_offset(&contents)
        .filter(|offset| offset + replacement.len() <= contents.len())
        .ok_or_else(|| HostError::MissingUpdateEndpoint {
            path: executable.to_path_buf(),
        })?;

    file.seek(SeekFrom::Start(offset as u64)).map_err(io_error)?;
    file.write_all(replacement).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    info!(
        target: HOST_TARGET,
        path = %executable.display(),
        enabled,
        "patched update endpoint"
    );
    Ok(())
}

/// Offset of the segment following the first update marker.
fn endpoint_offset(contents: &[u8]) -> Option<usize> {
    contents
        .windows(UPDATE_MARKER.len())
        .position(|window| window == UPDATE_MARKER)
        .map(|position| position + UPDATE_MARKER.len())
}

/// Arguments for launching the host: the mirrored app directory first when
/// mirroring, then `extra` unchanged.
#[must_use]
pub fn launch_arguments(config: &Config, extra: &[OsString]) -> Vec<OsString> {
    let mut arguments = Vec::with_capacity(extra.len() + 1);
    if config.mirror {
        let mut flag = OsString::from(APP_DIRECTORY_FLAG);
        flag.push(config.layout().apps_dir());
        arguments.push(flag);
    }
    arguments.extend_from_slice(extra);
    arguments
}
