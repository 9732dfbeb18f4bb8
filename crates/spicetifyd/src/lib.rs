//! Long-running companion of the spicetify CLI.
//!
//! The daemon keeps the vault injected into the host application across its
//! self-updates and gives the host's web content a local control plane:
//!
//! - an apps watcher re-applies the injection whenever the host restores its
//!   `xpui.spa` bundle;
//! - `/proxy/<target>` forwards requests with cookie persistence, header
//!   overrides and CORS rewriting;
//! - `/rpc` is a websocket carrying the same protocol envelopes the CLI's
//!   `protocol` command handles.
//!
//! Configuration is re-read whenever its file changes and published as a
//! generation-stamped [`Settings`] snapshot.

mod health;
mod inject;
pub mod proxy;
pub mod rpc;
mod runtime;
mod server;
mod settings;
pub mod telemetry;
mod watcher;

pub use health::{HealthReporter, StructuredHealthReporter};
pub use inject::{Injector, SpaInjector};
pub use runtime::{
    ArgsConfigLoader, ConfigLoader, LaunchError, Services, ShutdownReason, run, run_daemon,
    run_daemon_with, wait_for_signal,
};
pub use server::{DaemonState, HttpListener, ServerError, router};
pub use settings::{Settings, SettingsCell};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use watcher::{WatchError, WatcherHandle};
