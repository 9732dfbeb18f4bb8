//! Injects the vault into the host application's web bundle.
//!
//! The host ships its UI as `Apps/xpui.spa`, a zip archive. Injection
//! extracts it into an `xpui` folder (next to the archive, or under the
//! config root in mirror mode), moves the archive aside as `xpui.spa.bak` so
//! the host loads the extracted folder, and links the vault's `modules/` and
//! `store/` folders into it. Restoring reverses those steps.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use spicetify_config::{Config, VaultLayout};
use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::link::{ensure_link, remove_entry};

const INJECT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::inject");

/// File name of the host's UI bundle.
pub const BUNDLE_FILE: &str = "xpui.spa";

const BUNDLE_STEM: &str = "xpui";
const BACKUP_SUFFIX: &str = ".bak";

/// Errors raised while injecting or restoring the host bundle.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The bundle archive does not exist.
    #[error("host bundle not found at '{path}'")]
    MissingBundle {
        /// Expected bundle path.
        path: PathBuf,
    },
    /// The bundle could not be extracted.
    #[error("failed to extract '{path}': {source}")]
    Archive {
        /// Bundle path.
        path: PathBuf,
        /// Archive error.
        #[source]
        source: zip::result::ZipError,
    },
    /// A filesystem step failed.
    #[error("IO error at '{path}': {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Nothing to restore.
    #[error("host installation is already in its stock state")]
    AlreadyStock,
}

impl InjectError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the bundle lives and where it is extracted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    apps_dir: PathBuf,
    layout: VaultLayout,
    mirror: bool,
}

impl HostPaths {
    /// Builds the paths from the host's `Apps` folder and the vault layout.
    pub fn new(apps_dir: impl Into<PathBuf>, layout: VaultLayout, mirror: bool) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            layout,
            mirror,
        }
    }

    /// Builds the paths from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.spotify_apps_path().into_std_path_buf(),
            config.layout(),
            config.mirror,
        )
    }

    /// The bundle archive.
    #[must_use]
    pub fn bundle(&self) -> PathBuf {
        self.apps_dir.join(BUNDLE_FILE)
    }

    /// Where the bundle is moved aside to.
    #[must_use]
    pub fn backup(&self) -> PathBuf {
        let mut name = OsString::from(BUNDLE_FILE);
        name.push(BACKUP_SUFFIX);
        self.apps_dir.join(name)
    }

    /// Folder receiving the extracted bundle.
    #[must_use]
    pub fn extracted(&self) -> PathBuf {
        let root = if self.mirror {
            self.layout.apps_dir()
        } else {
            self.apps_dir.as_path()
        };
        root.join(BUNDLE_STEM)
    }
}

/// Extracts the bundle and links the vault into it.
///
/// Returns the folder the bundle was extracted into.
pub fn apply(paths: &HostPaths) -> Result<PathBuf, InjectError> {
    let bundle = paths.bundle();
    let file = File::open(&bundle).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => InjectError::MissingBundle {
            path: bundle.clone(),
        },
        _ => InjectError::io(&bundle, source),
    })?;

    let extracted = paths.extracted();
    remove_entry(&extracted).map_err(|source| InjectError::io(&extracted, source))?;
    info!(
        target: INJECT_TARGET,
        bundle = %bundle.display(),
        destination = %extracted.display(),
        "extracting host bundle"
    );
    ZipArchive::new(file)
        .and_then(|mut archive| archive.extract(&extracted))
        .map_err(|source| InjectError::Archive {
            path: bundle.clone(),
            source,
        })?;

    if !paths.mirror {
        let backup = paths.backup();
        remove_entry(&backup).map_err(|source| InjectError::io(&backup, source))?;
        fs::rename(&bundle, &backup).map_err(|source| InjectError::io(&bundle, source))?;
        info!(target: INJECT_TARGET, backup = %backup.display(), "moved bundle aside");
    }

    for folder in [paths.layout.modules_dir(), paths.layout.store_dir()] {
        fs::create_dir_all(folder).map_err(|source| InjectError::io(folder, source))?;
        let Some(name) = folder.file_name() else {
            continue;
        };
        let link = extracted.join(name);
        ensure_link(folder, &link).map_err(|source| InjectError::io(&link, source))?;
    }
    info!(target: INJECT_TARGET, destination = %extracted.display(), "vault linked into host bundle");
    Ok(extracted)
}

/// Returns the host to its stock state.
pub fn restore(paths: &HostPaths) -> Result<(), InjectError> {
    if paths.mirror {
        let apps = paths.layout.apps_dir();
        if !apps.exists() {
            return Err(InjectError::AlreadyStock);
        }
        return remove_entry(apps).map_err(|source| InjectError::io(apps, source));
    }

    let backup = paths.backup();
    if !backup.exists() {
        return Err(InjectError::AlreadyStock);
    }
    let extracted = paths.extracted();
    if let Err(error) = remove_entry(&extracted) {
        warn!(
            target: INJECT_TARGET,
            path = %extracted.display(),
            %error,
            "failed to remove extracted bundle"
        );
    }
    let bundle = paths.bundle();
    fs::rename(&backup, &bundle).map_err(|source| InjectError::io(&backup, source))?;
    info!(target: INJECT_TARGET, bundle = %bundle.display(), "host bundle restored");
    Ok(())
}
