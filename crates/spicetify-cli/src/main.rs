//! CLI entrypoint for the `spicetify` module manager.
//!
//! The streams stay unlocked: `daemon start` logs to stderr from runtime
//! worker threads while this thread is blocked.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    spicetify_cli::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
