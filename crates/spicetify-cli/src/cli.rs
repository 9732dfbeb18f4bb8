//! CLI argument definitions for the `spicetify` binary.

use std::ffi::OsString;

use clap::{Args, Parser, Subcommand, ValueEnum};
use spicetify_vault::hooks::HOOKS_RELEASE_URL;

/// Command-line interface for managing spicetify modules.
#[derive(Parser, Debug)]
#[command(name = "spicetify", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The command to run.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Writes the config file if absent and resets the vault.
    ///
    /// The `hooks`, `modules` and `store` folders are removed only when they
    /// are empty or links; installed module files are kept.
    Init,
    /// Injects the vault into the host application's bundle.
    Apply,
    /// Restores the stock host bundle.
    Fix,
    /// Prints the effective configuration as TOML.
    Config,
    /// Manages modules in the vault.
    Pkg {
        /// The package action to perform.
        #[command(subcommand)]
        action: PkgAction,
    },
    /// Handles a `spicetify:` protocol URI.
    Protocol {
        /// URI of the form `spicetify:<correlationId>:<action>?<query>`.
        uri: String,
    },
    /// Runs daemon lifecycle commands.
    ///
    /// Without an action the daemon starts only when the configuration
    /// enables it.
    Daemon {
        /// The lifecycle action to perform.
        #[command(subcommand)]
        action: Option<DaemonAction>,
    },
    /// Replaces the hook scripts with the latest published release.
    Sync {
        /// Release archive to download.
        #[arg(long, default_value = HOOKS_RELEASE_URL)]
        url: String,
    },
    /// Prints the host and configuration paths.
    Paths(PathSelection),
    /// Patches or launches the host application.
    Spotify {
        /// The host action to perform.
        #[command(subcommand)]
        action: SpotifyAction,
    },
}

/// Paths printed by `paths`; none selected prints them all.
#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PathSelection {
    /// Show the host data path.
    #[arg(long)]
    pub(crate) spotify_data_path: bool,
    /// Show the host executable path.
    #[arg(long)]
    pub(crate) spotify_exec_path: bool,
    /// Show the host config path.
    #[arg(long)]
    pub(crate) spotify_config_path: bool,
    /// Show the config file path.
    #[arg(long)]
    pub(crate) config: bool,
}

impl PathSelection {
    /// The selection with an empty one widened to every path.
    pub(crate) fn or_all(self) -> Self {
        if self == Self::default() {
            Self {
                spotify_data_path: true,
                spotify_exec_path: true,
                spotify_config_path: true,
                config: true,
            }
        } else {
            self
        }
    }
}

/// Host application actions.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum SpotifyAction {
    /// Blocks or unblocks the host's self-updates.
    Update {
        /// `on` restores updates, `off` blocks them.
        #[arg(value_enum)]
        state: UpdateState,
    },
    /// Launches the host, forwarding any further arguments.
    Run {
        /// Arguments passed to the host executable.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
}

/// Desired state of the host's self-updates.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateState {
    /// Updates allowed.
    On,
    /// Updates blocked.
    Off,
}

/// Module management actions.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum PkgAction {
    /// Adds and installs a module version.
    Install {
        /// Store identifier, `<module>@<version>`.
        id: String,
        /// Artifact locations; the first one is installed.
        #[arg(required = true)]
        artifacts: Vec<String>,
        /// Expected digest of the extracted store.
        #[arg(long, default_value = "")]
        checksum: String,
    },
    /// Disables, deletes and removes a module version.
    Delete {
        /// Store identifier, `<module>@<version>`.
        id: String,
    },
    /// Enables a module version; `<module>@` disables the module.
    Enable {
        /// Store identifier, `<module>@<version>`.
        id: String,
    },
    /// Prints the metadata of a recorded module version.
    Show {
        /// Store identifier, `<module>@<version>`.
        id: String,
    },
    /// Prints the vault.
    List,
}

/// Daemon lifecycle actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DaemonAction {
    /// Runs the daemon in the foreground until it is disabled or interrupted.
    Start,
    /// Sets `daemon = true` in the config file.
    Enable,
    /// Sets `daemon = false` in the config file; a running daemon stops.
    Disable,
}
