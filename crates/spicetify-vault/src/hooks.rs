//! Hook scripts published as a `.tar.gz` release and unpacked under `hooks/`.

use std::fs;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};

use crate::artifact::{http_agent, map_ureq_error};
use crate::error::VaultError;
use crate::link::remove_entry;

const HOOKS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::hooks");

/// Latest published hooks archive.
pub const HOOKS_RELEASE_URL: &str =
    "https://github.com/spicetify/hooks/releases/latest/download/hooks.tar.gz";

/// Downloads the archive at `url` and replaces `hooks_dir` with its contents.
///
/// The download completes before `hooks_dir` is removed, so a failed
/// request leaves the current hooks in place. Returns the number of entries
/// unpacked.
pub fn sync_hooks(url: &str, hooks_dir: &Path) -> Result<usize, VaultError> {
    info!(target: HOOKS_TARGET, url, "downloading hooks");
    let response = http_agent()
        .get(url)
        .call()
        .map_err(|error| map_ureq_error(url, &error))?;
    let mut bytes = Vec::new();
    response
        .into_body()
        .as_reader()
        .read_to_end(&mut bytes)
        .map_err(|error| VaultError::network(url, error))?;

    remove_entry(hooks_dir).map_err(|error| VaultError::io(hooks_dir, error))?;
    let count = extract_tar_gz(bytes.as_slice(), hooks_dir)?;
    info!(
        target: HOOKS_TARGET,
        entries = count,
        path = %hooks_dir.display(),
        "hooks updated"
    );
    Ok(count)
}

/// Unpacks a gzip-compressed tar stream into `destination`.
///
/// Entries with absolute paths or `..` components are rejected before
/// anything is written for them.
pub fn extract_tar_gz<R: Read>(reader: R, destination: &Path) -> Result<usize, VaultError> {
    fs::create_dir_all(destination).map_err(|error| VaultError::io(destination, error))?;
    let unpack_error = |source| VaultError::Unpack {
        path: destination.to_path_buf(),
        source,
    };

    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut count = 0;
    for entry in archive.entries().map_err(unpack_error)? {
        let mut entry = entry.map_err(unpack_error)?;
        let relative = entry.path().map_err(unpack_error)?.into_owned();
        validate_entry_path(&relative)?;

        let target = destination.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|error| VaultError::io(parent, error))?;
        }
        debug!(target: HOOKS_TARGET, entry = %relative.display(), "unpacking");
        entry
            .unpack(&target)
            .map_err(|error| VaultError::io(&target, error))?;
        count += 1;
    }

    if count == 0 {
        return Err(VaultError::EmptyArchive {
            path: destination.to_path_buf(),
        });
    }
    Ok(count)
}

fn validate_entry_path(path: &Path) -> Result<(), VaultError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(VaultError::precondition(format!(
            "archive entry '{}' escapes the destination",
            path.display()
        )));
    }
    Ok(())
}
