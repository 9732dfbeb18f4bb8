use std::env;

use camino::{Utf8Path, Utf8PathBuf};

use crate::options::{ChecksumPolicy, LogFormat};

/// Address the daemon's HTTP surface listens on.
pub const DEFAULT_DAEMON_ADDR: &str = "localhost:7967";

/// Origin of the host application's embedded web content.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://xpui.app.spotify.com";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default checksum handling for remote installs.
#[must_use]
pub fn default_checksum_policy() -> ChecksumPolicy {
    ChecksumPolicy::Warn
}

/// Owned daemon address.
#[must_use]
pub fn default_daemon_addr() -> String {
    DEFAULT_DAEMON_ADDR.to_owned()
}

/// Owned allowed origin.
#[must_use]
pub fn default_allowed_origin() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_owned()
}

/// Directory holding `config.toml`, the vault, and the module store.
#[must_use]
pub fn default_config_root() -> Utf8PathBuf {
    let mut base = dirs::config_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.push("spicetify");
    base
}

/// First host installation found on this machine, or the most common
/// location when none is present.
#[must_use]
pub fn default_spotify_data_path() -> Utf8PathBuf {
    let candidates = spotify_data_candidates();
    candidates
        .iter()
        .find(|candidate| spotify_exec_path_for(candidate).exists())
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(fallback_base_directory)
}

/// Executable path for the default data path.
#[must_use]
pub fn default_spotify_exec_path() -> Utf8PathBuf {
    spotify_exec_path_for(&default_spotify_data_path())
}

/// Folder holding the host's prefs and offline bundle.
#[must_use]
pub fn default_spotify_config_path() -> Utf8PathBuf {
    let base = platform_spotify_config_base()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.join("spotify")
}

/// Derives the executable path from a data path.
#[must_use]
pub fn spotify_exec_path_for(data_path: &Utf8Path) -> Utf8PathBuf {
    #[cfg(target_os = "windows")]
    {
        data_path.join("Spotify.exe")
    }
    #[cfg(target_os = "macos")]
    {
        data_path
            .parent()
            .map_or_else(|| data_path.join("MacOS"), |contents| contents.join("MacOS"))
            .join("Spotify")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        data_path.join("spotify")
    }
}

/// Directory the host unpacks its web bundles into.
#[must_use]
pub fn spotify_apps_path(data_path: &Utf8Path) -> Utf8PathBuf {
    data_path.join("Apps")
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn spotify_data_candidates() -> Vec<Utf8PathBuf> {
    let mut candidates: Vec<Utf8PathBuf> = [
        "/opt/spotify",
        "/opt/spotify/spotify-client",
        "/usr/share/spotify",
        "/usr/libexec/spotify",
        "/var/lib/flatpak/app/com.spotify.Client/x86_64/stable/active/files/extra/share/spotify",
    ]
    .into_iter()
    .map(Utf8PathBuf::from)
    .collect();

    if let Some(home) = dirs::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        candidates.push(home.join(
            ".local/share/flatpak/app/com.spotify.Client/x86_64/stable/active/files/extra/share/spotify",
        ));
        candidates.push(home.join(".local/share/spotify-launcher/install/usr/share/spotify"));
    }
    candidates
}

#[cfg(target_os = "macos")]
fn spotify_data_candidates() -> Vec<Utf8PathBuf> {
    vec![Utf8PathBuf::from("/Applications/Spotify.app/Contents/Resources")]
}

#[cfg(target_os = "windows")]
fn spotify_data_candidates() -> Vec<Utf8PathBuf> {
    dirs::config_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .map(|roaming| vec![roaming.join("Spotify")])
        .unwrap_or_default()
}

#[cfg(not(target_os = "windows"))]
fn platform_spotify_config_base() -> Option<std::path::PathBuf> {
    dirs::cache_dir()
}

#[cfg(target_os = "windows")]
fn platform_spotify_config_base() -> Option<std::path::PathBuf> {
    dirs::data_local_dir()
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
