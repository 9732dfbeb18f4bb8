//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use spicetify_config::{ConfigFileError, LayoutError};
use spicetify_vault::host::HostError;
use spicetify_vault::inject::InjectError;
use spicetify_vault::{ProtocolError, VaultError};
use spicetifyd::{LaunchError, TelemetryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Inject(#[from] InjectError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("failed to launch {}: {source}", program.display())]
    Launch { program: PathBuf, source: io::Error },
    #[error("failed to render configuration: {0}")]
    RenderConfig(#[from] toml::ser::Error),
    #[error("failed to render JSON output: {0}")]
    RenderJson(#[from] serde_json::Error),
    #[error("failed to open {uri}: {source}")]
    Open { uri: String, source: io::Error },
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    #[error("daemon failed: {0}")]
    Daemon(#[from] LaunchError),
}
