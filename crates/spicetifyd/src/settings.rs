//! Generation-stamped settings snapshot shared by the daemon's tasks.
//!
//! The config watcher is the only writer. Every other activity loads the
//! current snapshot at the top of its loop iteration and never observes a
//! partially updated configuration.

use std::sync::Arc;

use arc_swap::ArcSwap;
use camino::Utf8PathBuf;
use spicetify_config::{ChecksumPolicy, Config, VaultLayout};
use spicetify_vault::inject::HostPaths;

/// Immutable view of the daemon-relevant configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    generation: u64,
    /// Whether the daemon should keep running.
    pub daemon: bool,
    /// Extract host bundles under the config root.
    pub mirror: bool,
    /// Host installation folder.
    pub spotify_data_path: Utf8PathBuf,
    /// Root of the vault and store.
    pub config_root: Utf8PathBuf,
    /// Address the HTTP surface binds to and advertises in redirects.
    pub daemon_addr: String,
    /// Origin echoed in proxy CORS headers.
    pub allowed_origin: String,
    /// Checksum handling for remote installs.
    pub checksum_policy: ChecksumPolicy,
}

impl Settings {
    /// Builds generation zero from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            generation: 0,
            daemon: config.daemon,
            mirror: config.mirror,
            spotify_data_path: config.spotify_data_path.clone(),
            config_root: config.config_root.clone(),
            daemon_addr: config.daemon_addr.clone(),
            allowed_origin: config.allowed_origin.clone(),
            checksum_policy: config.checksum_policy,
        }
    }

    /// Monotonic counter bumped on every publish.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Folder the apps watcher observes.
    #[must_use]
    pub fn apps_path(&self) -> Utf8PathBuf {
        spicetify_config::spotify_apps_path(&self.spotify_data_path)
    }

    /// Vault paths below the config root.
    #[must_use]
    pub fn layout(&self) -> VaultLayout {
        VaultLayout::new(self.config_root.as_std_path())
    }

    /// Bundle paths used by the injector.
    #[must_use]
    pub fn host_paths(&self) -> HostPaths {
        HostPaths::new(self.apps_path().into_std_path_buf(), self.layout(), self.mirror)
    }
}

/// Atomically swappable holder of the current [`Settings`].
#[derive(Debug)]
pub struct SettingsCell {
    current: ArcSwap<Settings>,
}

impl SettingsCell {
    /// Starts the cell at generation zero.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(Settings::from_config(config)),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Replaces the snapshot and returns the new one, one generation later.
    pub fn publish(&self, config: &Config) -> Arc<Settings> {
        let next = Arc::new(Settings {
            generation: self.current.load().generation + 1,
            ..Settings::from_config(config)
        });
        self.current.store(Arc::clone(&next));
        next
    }
}
