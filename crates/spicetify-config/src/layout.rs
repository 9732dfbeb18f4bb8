//! Derives the on-disk layout shared by the CLI and daemon.
//!
//! Everything lives under the configured root: the config file, the vault
//! document and its lock, the activation links under `modules/`, the
//! per-version store under `store/`, the mirrored host bundles under
//! `apps/`, and the hook scripts fetched by `sync` under `hooks/`. Both binaries must agree on this layout because the daemon
//! mutates the same vault the CLI does.

use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use thiserror::Error;

use crate::Config;

/// Canonical paths below the configuration root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    root: PathBuf,
    modules_dir: PathBuf,
    store_dir: PathBuf,
    apps_dir: PathBuf,
    hooks_dir: PathBuf,
    vault_path: PathBuf,
    lock_path: PathBuf,
    config_file: PathBuf,
}

impl VaultLayout {
    /// Derives the layout from a root directory without touching the disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let modules_dir = root.join("modules");
        Self {
            store_dir: root.join("store"),
            apps_dir: root.join("apps"),
            hooks_dir: root.join("hooks"),
            vault_path: modules_dir.join("vault.json"),
            lock_path: modules_dir.join("vault.lock"),
            config_file: root.join("config.toml"),
            modules_dir,
            root,
        }
    }

    /// Derives the layout from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.config_root.as_std_path())
    }

    /// Default location of the config file for a given root.
    #[must_use]
    pub fn config_file_for(root: &Utf8Path) -> PathBuf {
        Self::new(root.as_std_path()).config_file
    }

    /// Creates the `modules/` and `store/` directories.
    pub fn prepare(&self) -> Result<(), LayoutError> {
        for dir in [&self.modules_dir, &self.store_dir] {
            fs::create_dir_all(dir).map_err(|source| LayoutError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding activation links and the vault document.
    #[must_use]
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Directory holding one folder per installed version.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Destination for host bundles when mirror mode is active.
    #[must_use]
    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    /// Destination of the hook scripts unpacked by `sync`.
    #[must_use]
    pub fn hooks_dir(&self) -> &Path {
        &self.hooks_dir
    }

    /// The vault document.
    #[must_use]
    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// Lock file serialising vault mutations.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// The TOML configuration file.
    #[must_use]
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}

/// Errors raised while preparing the layout on disk.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A layout directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_paths_below_root() {
        let layout = VaultLayout::new("/cfg/spicetify");
        assert_eq!(layout.modules_dir(), Path::new("/cfg/spicetify/modules"));
        assert_eq!(layout.store_dir(), Path::new("/cfg/spicetify/store"));
        assert_eq!(layout.hooks_dir(), Path::new("/cfg/spicetify/hooks"));
        assert_eq!(
            layout.vault_path(),
            Path::new("/cfg/spicetify/modules/vault.json")
        );
        assert_eq!(
            layout.lock_path(),
            Path::new("/cfg/spicetify/modules/vault.lock")
        );
        assert_eq!(
            layout.config_file(),
            Path::new("/cfg/spicetify/config.toml")
        );
    }

    #[test]
    fn prepare_creates_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = VaultLayout::new(dir.path().join("root"));
        layout.prepare().expect("prepare layout");
        assert!(layout.modules_dir().is_dir());
        assert!(layout.store_dir().is_dir());
    }
}
