//! Reads and rewrites the TOML configuration file in place.
//!
//! The daemon watches this file, so edits made here are how the CLI talks to
//! a running daemon.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const DAEMON_KEY: &str = "daemon";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Reading or writing the file failed.
    #[error("failed to access configuration file '{path}': {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The existing file is not valid TOML.
    #[error("configuration file '{path}' is not valid TOML: {source}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
    /// The configuration could not be rendered as TOML.
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Writes `config` to `path` unless a file already exists there.
///
/// Returns `true` when a new file was written.
pub fn write_default_file(path: &Path, config: &Config) -> Result<bool, ConfigFileError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(path, source))?;
    }
    let rendered = toml::to_string_pretty(config)?;
    fs::write(path, rendered).map_err(|source| io_error(path, source))?;
    Ok(true)
}

/// Sets the `daemon` key, preserving every other entry of the file.
///
/// A missing file is treated as empty.
pub fn set_daemon_flag(path: &Path, enabled: bool) -> Result<(), ConfigFileError> {
    let mut table = match fs::read_to_string(path) {
        Ok(contents) => contents
            .parse::<toml::Table>()
            .map_err(|source| ConfigFileError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => toml::Table::new(),
        Err(source) => return Err(io_error(path, source)),
    };
    table.insert(DAEMON_KEY.to_owned(), toml::Value::Boolean(enabled));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(path, source))?;
    }
    let rendered = toml::to_string_pretty(&table)?;
    fs::write(path, rendered).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: io::Error) -> ConfigFileError {
    ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}
