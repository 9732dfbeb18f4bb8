//! Artifacts living in a local directory, linked into the store.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::error::VaultError;
use crate::link::ensure_link;
use crate::metadata::Metadata;

const LOCAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::local");

const METADATA_FILE: &str = "metadata.json";

/// A module folder on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Folder as referenced.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute, lexically normalised form of the folder path.
    ///
    /// # Errors
    ///
    /// Fails only when the current directory cannot be determined.
    pub fn absolute_path(&self) -> Result<PathBuf, VaultError> {
        let absolute = std::path::absolute(&self.path)
            .map_err(|source| VaultError::io(&self.path, source))?;
        Ok(normalise(&absolute))
    }

    /// Reads `<folder>/metadata.json`.
    pub fn fetch_metadata(&self) -> Result<Metadata, VaultError> {
        let path = self.path.join(METADATA_FILE);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => VaultError::not_found(path.display().to_string()),
            _ => VaultError::io(&path, source),
        })?;
        Metadata::from_slice(&bytes).map_err(|source| VaultError::Decode {
            location: path.display().to_string(),
            source,
        })
    }

    /// Replaces `destination` with a link to the folder's absolute path.
    pub fn install_into(&self, destination: &Path) -> Result<(), VaultError> {
        let target = self.absolute_path()?;
        ensure_link(&target, destination).map_err(|source| VaultError::io(destination, source))?;
        info!(
            target: LOCAL_TARGET,
            source = %target.display(),
            destination = %destination.display(),
            "linked local artifact"
        );
        Ok(())
    }
}

/// Removes `.` components and folds `..` into the preceding segment.
fn normalise(path: &Path) -> PathBuf {
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalised.pop();
            }
            other => normalised.push(other.as_os_str()),
        }
    }
    normalised
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;

    #[rstest]
    #[case("/a/b/../c", "/a/c")]
    #[case("/a/./b/", "/a/b")]
    #[case("/../a", "/a")]
    fn normalises_lexically(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalise(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let artifact = LocalArtifact::new("some/../module");
        let absolute = artifact.absolute_path().expect("absolute");
        assert!(absolute.is_absolute());
        assert!(absolute.ends_with("module"));
        assert!(!absolute.components().any(|c| c == Component::ParentDir));
    }

    #[test]
    fn missing_metadata_is_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let error = LocalArtifact::new(dir.path())
            .fetch_metadata()
            .expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn malformed_metadata_is_a_decode_error() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join(METADATA_FILE), "{not json").expect("write");
        let error = LocalArtifact::new(dir.path())
            .fetch_metadata()
            .expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::Decode);
    }

    #[test]
    fn reads_metadata_from_folder() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"name":"local-theme","version":"0.1.0"}"#,
        )
        .expect("write");
        let metadata = LocalArtifact::new(dir.path())
            .fetch_metadata()
            .expect("metadata");
        assert_eq!(metadata.name, "local-theme");
    }
}
