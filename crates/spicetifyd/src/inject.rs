//! Seam between the apps watcher and the host bundle injection routine.

use std::path::PathBuf;

use spicetify_vault::inject::{self, InjectError};

use crate::settings::Settings;

/// Re-applies the vault to the host after the host replaced its bundle.
#[cfg_attr(test, mockall::automock)]
pub trait Injector: Send + Sync {
    /// Injects using the paths of the given snapshot.
    fn inject(&self, settings: &Settings) -> Result<PathBuf, InjectError>;
}

/// Production injector extracting `xpui.spa` and linking the vault.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpaInjector;

impl Injector for SpaInjector {
    fn inject(&self, settings: &Settings) -> Result<PathBuf, InjectError> {
        inject::apply(&settings.host_paths())
    }
}
