//! Shared configuration for the spicetify CLI and daemon.
//!
//! The [`Config`] structure is loaded with `ortho_config`, layering the
//! TOML file selected by `--config-path`, `SPICETIFY_*` environment variables,
//! and command-line flags. Both binaries derive their on-disk layout from the
//! same [`VaultLayout`] so a vault mutated by the daemon is the vault the CLI
//! reads.

mod args;
mod defaults;
mod file;
mod layout;
mod options;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use args::{
    ArgumentSplit, CONFIG_CLI_FLAGS, CONFIG_PATH_FLAG, config_file, explicit_config_file,
    split_config_arguments, with_default_config_file,
};
pub use defaults::{
    DEFAULT_ALLOWED_ORIGIN, DEFAULT_DAEMON_ADDR, DEFAULT_LOG_FILTER, default_allowed_origin,
    default_checksum_policy, default_config_root, default_daemon_addr, default_log_filter,
    default_log_format, default_spotify_config_path, default_spotify_data_path,
    default_spotify_exec_path, spotify_apps_path, spotify_exec_path_for,
};
pub use file::{ConfigFileError, set_daemon_flag, write_default_file};
pub use layout::{LayoutError, VaultLayout};
pub use options::{ChecksumPolicy, LogFormat, OptionParseError};

/// Resolved configuration shared by the CLI and the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SPICETIFY")]
pub struct Config {
    /// Whether the daemon should keep running.
    #[ortho_config(default = true)]
    pub daemon: bool,
    /// Extract host bundles into the config root instead of in place.
    #[ortho_config(default = false)]
    pub mirror: bool,
    /// Installation folder of the host application.
    #[ortho_config(default = default_spotify_data_path())]
    pub spotify_data_path: Utf8PathBuf,
    /// Host executable launched by `apply`.
    #[ortho_config(default = default_spotify_exec_path())]
    pub spotify_exec_path: Utf8PathBuf,
    /// Folder holding the host's prefs and offline bundle.
    #[ortho_config(default = default_spotify_config_path())]
    pub spotify_config_path: Utf8PathBuf,
    /// Root of `config.toml`, the vault, and the module store.
    #[ortho_config(default = default_config_root())]
    pub config_root: Utf8PathBuf,
    /// `host:port` the daemon's HTTP surface binds to.
    #[ortho_config(default = default_daemon_addr())]
    pub daemon_addr: String,
    /// Origin echoed in proxy CORS headers.
    #[ortho_config(default = default_allowed_origin())]
    pub allowed_origin: String,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// How recorded checksums are treated on remote installs.
    #[ortho_config(default = default_checksum_policy())]
    pub checksum_policy: ChecksumPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: true,
            mirror: false,
            spotify_data_path: default_spotify_data_path(),
            spotify_exec_path: default_spotify_exec_path(),
            spotify_config_path: default_spotify_config_path(),
            config_root: default_config_root(),
            daemon_addr: default_daemon_addr(),
            allowed_origin: default_allowed_origin(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            checksum_policy: default_checksum_policy(),
        }
    }
}

impl Config {
    /// Directory the host unpacks its web bundles into.
    #[must_use]
    pub fn spotify_apps_path(&self) -> Utf8PathBuf {
        spotify_apps_path(&self.spotify_data_path)
    }

    /// Root directory of the vault and store.
    #[must_use]
    pub fn config_root(&self) -> &Utf8Path {
        &self.config_root
    }

    /// Paths derived from [`Config::config_root`].
    #[must_use]
    pub fn layout(&self) -> VaultLayout {
        VaultLayout::from_config(self)
    }

    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
