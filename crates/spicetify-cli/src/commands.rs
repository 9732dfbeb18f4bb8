//! Handlers for the `spicetify` subcommands.
//!
//! Each handler receives the loaded configuration and the flags it was
//! loaded from, performs its work synchronously and reports to `stdout`.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use spicetify_config::{Config, config_file, set_daemon_flag, write_default_file};
use spicetify_vault::hooks::sync_hooks;
use spicetify_vault::host::{launch_arguments, set_updates};
use spicetify_vault::inject::{self, HostPaths};
use spicetify_vault::link::remove_vacant;
use spicetify_vault::{ArtifactReference, Dispatcher, ModuleManager, StoreIdentifier, VaultError};
use tracing::{debug, info};

use crate::AppError;
use crate::cli::{CliCommand, DaemonAction, PathSelection, PkgAction, SpotifyAction, UpdateState};
use crate::host::HostLauncher;
use crate::launcher::DaemonLauncher;
use crate::opener::UrlOpener;

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Prefix of the URI that hands a protocol reply back to the host.
pub(crate) const RPC_REPLY_PREFIX: &str = "spotify:app:rpc:";

/// Everything a handler may touch besides its output stream.
pub(crate) struct CommandContext<'a> {
    pub(crate) config: &'a Config,
    pub(crate) config_arguments: &'a [OsString],
    pub(crate) opener: &'a dyn UrlOpener,
    pub(crate) launcher: &'a dyn DaemonLauncher,
    pub(crate) host: &'a dyn HostLauncher,
}

impl CommandContext<'_> {
    fn manager(&self) -> ModuleManager {
        ModuleManager::from_config(self.config)
    }
}

pub(crate) fn execute<W: Write>(
    command: CliCommand,
    context: &CommandContext<'_>,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    match command {
        CliCommand::Init => init(context, stdout)?,
        CliCommand::Apply => apply(context, stdout)?,
        CliCommand::Fix => fix(context, stdout)?,
        CliCommand::Config => print_config(context, stdout)?,
        CliCommand::Pkg { action } => pkg(action, context, stdout)?,
        CliCommand::Protocol { uri } => protocol(&uri, context)?,
        CliCommand::Daemon { action } => daemon(action, context, stdout)?,
        CliCommand::Sync { url } => sync(&url, context, stdout)?,
        CliCommand::Paths(selection) => paths(selection, context, stdout)?,
        CliCommand::Spotify { action } => spotify(action, context, stdout)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn init<W: Write>(context: &CommandContext<'_>, stdout: &mut W) -> Result<(), AppError> {
    let path = config_file(context.config_arguments);
    if write_default_file(&path, context.config)? {
        info!(target: COMMAND_TARGET, path = %path.display(), "configuration written");
    }

    let layout = context.config.layout();
    for folder in [layout.hooks_dir(), layout.modules_dir(), layout.store_dir()] {
        let removed = remove_vacant(folder).map_err(|error| VaultError::io(folder, error))?;
        debug!(target: COMMAND_TARGET, folder = %folder.display(), removed, "reset folder");
    }
    layout.prepare()?;
    context.manager().vault().reset()?;
    say(stdout, format_args!("initialised {}", layout.root().display()))
}

fn apply<W: Write>(context: &CommandContext<'_>, stdout: &mut W) -> Result<(), AppError> {
    context.config.layout().prepare()?;
    let extracted = inject::apply(&HostPaths::from_config(context.config))?;
    say(stdout, format_args!("applied to {}", extracted.display()))
}

fn fix<W: Write>(context: &CommandContext<'_>, stdout: &mut W) -> Result<(), AppError> {
    inject::restore(&HostPaths::from_config(context.config))?;
    say(stdout, format_args!("restored the stock bundle"))
}

fn print_config<W: Write>(context: &CommandContext<'_>, stdout: &mut W) -> Result<(), AppError> {
    let rendered = toml::to_string_pretty(context.config)?;
    let path = config_file(context.config_arguments);
    say(stdout, format_args!("# {}\n{rendered}", path.display()))
}

fn pkg<W: Write>(
    action: PkgAction,
    context: &CommandContext<'_>,
    stdout: &mut W,
) -> Result<(), AppError> {
    let manager = context.manager();
    match action {
        PkgAction::Install {
            id,
            artifacts,
            checksum,
        } => {
            let id = StoreIdentifier::parse(&id);
            let artifacts: Vec<ArtifactReference> =
                artifacts.into_iter().map(ArtifactReference::new).collect();
            manager.fast_install(&id, &artifacts, &checksum)?;
            say(stdout, format_args!("installed {id}"))
        }
        PkgAction::Delete { id } => {
            let id = StoreIdentifier::parse(&id);
            manager.fast_remove(&id)?;
            say(stdout, format_args!("deleted {id}"))
        }
        PkgAction::Enable { id } => {
            let id = StoreIdentifier::parse(&id);
            manager.enable(&id)?;
            if id.version.is_empty() {
                say(stdout, format_args!("disabled {}", id.module))
            } else {
                say(stdout, format_args!("enabled {id}"))
            }
        }
        PkgAction::Show { id } => {
            let metadata = manager.metadata(&StoreIdentifier::parse(&id))?;
            say(stdout, format_args!("{}", serde_json::to_string_pretty(&metadata)?))
        }
        PkgAction::List => {
            let vault = manager.list()?;
            say(stdout, format_args!("{}", serde_json::to_string_pretty(&vault)?))
        }
    }
}

/// Dispatches the URI and hands a non-empty reply back to the host.
///
/// The reply is sent even when the action failed, so the host can settle
/// the pending request before the error is reported.
fn protocol(uri: &str, context: &CommandContext<'_>) -> Result<(), AppError> {
    let (reply, outcome) = Dispatcher::new(context.manager()).handle(uri);
    if !reply.is_empty() {
        let target = format!("{RPC_REPLY_PREFIX}{reply}");
        context
            .opener
            .open(&target)
            .map_err(|source| AppError::Open {
                uri: target.clone(),
                source,
            })?;
    }
    outcome.map_err(AppError::from)
}

fn daemon<W: Write>(
    action: Option<DaemonAction>,
    context: &CommandContext<'_>,
    stdout: &mut W,
) -> Result<(), AppError> {
    match action {
        None if !context.config.daemon => say(
            stdout,
            format_args!("daemon disabled in the configuration, not starting"),
        ),
        None | Some(DaemonAction::Start) => {
            let reason = context
                .launcher
                .start(context.config_arguments.to_vec())?;
            say(stdout, format_args!("daemon stopped ({reason})"))
        }
        Some(toggle @ (DaemonAction::Enable | DaemonAction::Disable)) => {
            let enabled = toggle == DaemonAction::Enable;
            let path = config_file(context.config_arguments);
            set_daemon_flag(&path, enabled)?;
            let state = if enabled { "enabled" } else { "disabled" };
            say(stdout, format_args!("daemon {state} in {}", path.display()))
        }
    }
}

fn sync<W: Write>(url: &str, context: &CommandContext<'_>, stdout: &mut W) -> Result<(), AppError> {
    let layout = context.config.layout();
    let count = sync_hooks(url, layout.hooks_dir())?;
    say(
        stdout,
        format_args!("unpacked {count} hook entries into {}", layout.hooks_dir().display()),
    )
}

fn paths<W: Write>(
    selection: PathSelection,
    context: &CommandContext<'_>,
    stdout: &mut W,
) -> Result<(), AppError> {
    let config = context.config;
    let selection = selection.or_all();
    say(stdout, format_args!("mirror: {}", config.mirror))?;
    if selection.spotify_data_path {
        say(stdout, format_args!("Spotify data path: {}", config.spotify_data_path))?;
    }
    if selection.spotify_exec_path {
        say(stdout, format_args!("Spotify exec path: {}", config.spotify_exec_path))?;
    }
    if selection.spotify_config_path {
        say(stdout, format_args!("Spotify config path: {}", config.spotify_config_path))?;
    }
    if selection.config {
        let path = config_file(context.config_arguments);
        say(stdout, format_args!("config file path: {}", path.display()))?;
    }
    Ok(())
}

fn spotify<W: Write>(
    action: SpotifyAction,
    context: &CommandContext<'_>,
    stdout: &mut W,
) -> Result<(), AppError> {
    let executable = context.config.spotify_exec_path.as_std_path();
    match action {
        SpotifyAction::Update { state } => {
            set_updates(executable, state == UpdateState::On)?;
            let verb = match state {
                UpdateState::On => "unblocked",
                UpdateState::Off => "blocked",
            };
            say(stdout, format_args!("{verb} updates in {}", executable.display()))
        }
        SpotifyAction::Run { args } => {
            let arguments = launch_arguments(context.config, &args);
            context
                .host
                .launch(executable, &arguments)
                .map_err(|source| AppError::Launch {
                    program: executable.to_path_buf(),
                    source,
                })?;
            say(stdout, format_args!("launched {}", executable.display()))
        }
    }
}

fn say<W: Write>(stdout: &mut W, message: std::fmt::Arguments<'_>) -> Result<(), AppError> {
    writeln!(stdout, "{message}").map_err(AppError::Output)
}
