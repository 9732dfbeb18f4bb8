//! Tree digests for installed stores.
//!
//! The digest covers every entry below the store root in sorted order: its
//! relative path with `/` separators, an entry tag, and either the file bytes
//! or the link target. Directory entries contribute their path only.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use spicetify_config::ChecksumPolicy;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::VaultError;
use crate::identifier::StoreIdentifier;

const CHECKSUM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::checksum");

/// Computes the lowercase hex SHA-256 digest of the tree rooted at `root`.
pub fn tree_digest(root: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            hasher.update(b"L\0");
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            let target = fs::read_link(entry.path())?;
            hasher.update(target.to_string_lossy().as_bytes());
        } else if file_type.is_dir() {
            hasher.update(b"D\0");
            hasher.update(name.as_bytes());
        } else {
            hasher.update(b"F\0");
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            hash_file(entry.path(), &mut hasher)?;
        }
        hasher.update(b"\n");
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_file(path: &Path, hasher: &mut Sha256) -> io::Result<()> {
    let mut file = fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        match buffer.get(..read) {
            Some([]) | None => return Ok(()),
            Some(chunk) => hasher.update(chunk),
        }
    }
}

/// Applies `policy` to a freshly extracted store.
///
/// Only [`ChecksumPolicy::Enforce`] can fail; the caller is responsible for
/// discarding the extraction when it does. `root` is the extracted tree,
/// which need not sit at its final store path yet.
pub fn verify_store(
    policy: ChecksumPolicy,
    id: &StoreIdentifier,
    root: &Path,
    expected: &str,
) -> Result<(), VaultError> {
    if policy == ChecksumPolicy::Skip {
        return Ok(());
    }
    if expected.is_empty() {
        if policy.fails_closed() {
            return Err(VaultError::precondition(format!(
                "no checksum recorded for {id}"
            )));
        }
        debug!(target: CHECKSUM_TARGET, store = %id, "no checksum recorded, skipping verification");
        return Ok(());
    }

    let actual = match tree_digest(root) {
        Ok(actual) => actual,
        Err(error) if policy.fails_closed() => return Err(VaultError::io(root, error)),
        Err(error) => {
            warn!(target: CHECKSUM_TARGET, store = %id, %error, "failed to compute store digest");
            return Ok(());
        }
    };

    if actual.eq_ignore_ascii_case(expected) {
        debug!(target: CHECKSUM_TARGET, store = %id, "checksum verified");
        return Ok(());
    }
    if policy.fails_closed() {
        return Err(VaultError::ChecksumMismatch {
            id: id.clone(),
            expected: expected.to_owned(),
            actual,
        });
    }
    warn!(
        target: CHECKSUM_TARGET,
        store = %id,
        expected,
        actual = %actual,
        "checksum mismatch, keeping installation"
    );
    Ok(())
}
