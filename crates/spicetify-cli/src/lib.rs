//! Command-line interface runtime for spicetify.
//!
//! The module owns argument parsing, configuration bootstrapping and
//! command dispatch. Leading configuration flags are split off and handed to
//! the loader; the remaining tokens are parsed into a command.
//! The runtime can be driven from the binary or from tests, where the
//! configuration loader, URL opener, daemon launcher and host launcher are
//! substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use spicetify_config::{ArgumentSplit, split_config_arguments};
use spicetifyd::telemetry;

mod cli;
mod commands;
mod config;
mod errors;
mod host;
mod launcher;
mod opener;

use cli::Cli;
use commands::CommandContext;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use host::{DetachedHost, HostLauncher};
use launcher::{DaemonLauncher, InProcessDaemon};
use opener::{SystemOpener, UrlOpener};

struct CliRunner<'a, L: ConfigLoader> {
    loader: &'a L,
    opener: &'a dyn UrlOpener,
    launcher: &'a dyn DaemonLauncher,
    host: &'a dyn HostLauncher,
    install_telemetry: bool,
}

impl<'a, L: ConfigLoader> CliRunner<'a, L> {
    fn new(loader: &'a L, opener: &'a dyn UrlOpener, launcher: &'a dyn DaemonLauncher) -> Self {
        Self {
            loader,
            opener,
            launcher,
            host: &DetachedHost,
            install_telemetry: false,
        }
    }

    #[cfg(test)]
    fn with_host(mut self, host: &'a dyn HostLauncher) -> Self {
        self.host = host;
        self
    }

    fn with_telemetry(mut self) -> Self {
        self.install_telemetry = true;
        self
    }

    fn run<I, W, E>(&self, args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        W: Write,
        E: Write,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
            Ok(cli) => cli,
            Err(error) => return report_usage(error, stdout, stderr),
        };

        let result = self.loader.load(&split.config_arguments).and_then(|config| {
            if self.install_telemetry {
                telemetry::initialise(&config)?;
            }
            let context = CommandContext {
                config: &config,
                config_arguments: &split.config_arguments,
                opener: self.opener,
                launcher: self.launcher,
                host: self.host,
            };
            commands::execute(cli.command, &context, stdout)
        });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => {
                let _ = writeln!(stderr, "spicetify: {error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Program name followed by the tokens after the configuration flags.
fn command_arguments(args: &[OsString], split: &ArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}

fn report_usage<W: Write, E: Write>(error: clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        let _ = write!(stdout, "{}", error.render());
        return ExitCode::SUCCESS;
    }
    let _ = write!(stderr, "{}", AppError::CliUsage(error));
    ExitCode::FAILURE
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner::new(&OrthoConfigLoader, &SystemOpener, &InProcessDaemon)
        .with_telemetry()
        .run(args, stdout, stderr)
}
