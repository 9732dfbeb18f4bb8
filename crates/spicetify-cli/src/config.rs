//! Configuration loading for the CLI.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use spicetify_config::{Config, with_default_config_file};

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the leading configuration flags.
    ///
    /// Flags listed in `CONFIG_CLI_FLAGS` must precede the command; anything
    /// after the first command token is parsed as part of the command.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(with_default_config_file(args.to_vec()))
            .map_err(AppError::LoadConfiguration)
    }
}
