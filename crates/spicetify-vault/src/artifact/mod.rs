//! Artifact references and their resolution into remote or local sources.
//!
//! A reference is classified structurally: anything that parses as a URL
//! whose scheme starts with `http` and that names a host is remote; every
//! other string is a filesystem path. Classification never touches the
//! network or the disk.

mod checksum;
mod local;
mod range;
mod remote;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use spicetify_config::ChecksumPolicy;
use url::Url;

use crate::error::VaultError;
use crate::identifier::StoreIdentifier;
use crate::metadata::Metadata;

pub use checksum::{tree_digest, verify_store};
pub use local::LocalArtifact;
pub use range::{READ_AHEAD, RangeReader, RangeSource};
pub use remote::{HttpRangeSource, RemoteArchive, RemoteArtifact, open_archive};
pub(crate) use remote::{http_agent, map_ureq_error};

/// Textual reference to an artifact: an HTTP(S) URL or a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ArtifactReference(String);

impl ArtifactReference {
    /// Wraps a reference string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the reference text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the reference.
    #[must_use]
    pub fn resolve(&self) -> Artifact {
        resolve(self)
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// `.zip` archive served over HTTP(S).
    Remote(RemoteArtifact),
    /// Folder on the local filesystem.
    Local(LocalArtifact),
}

/// Classifies `reference` as remote or local. Pure and total.
#[must_use]
pub fn resolve(reference: &ArtifactReference) -> Artifact {
    let text = reference.as_str();
    match Url::parse(text) {
        Ok(url) if is_http_url(&url) => Artifact::Remote(RemoteArtifact::new(text)),
        _ => Artifact::Local(LocalArtifact::new(text)),
    }
}

fn is_http_url(url: &Url) -> bool {
    url.scheme().starts_with("http") && url.host_str().is_some_and(|host| !host.is_empty())
}

impl Artifact {
    /// Fetches the artifact's metadata document. Never cached.
    pub fn fetch_metadata(&self) -> Result<Metadata, VaultError> {
        match self {
            Self::Remote(remote) => remote.fetch_metadata(),
            Self::Local(local) => local.fetch_metadata(),
        }
    }

    /// Materialises the artifact at `destination`.
    ///
    /// Remote archives are extracted and checked against `checksum` under
    /// `policy`; local folders are linked and never checksummed.
    pub fn install_into(
        &self,
        id: &StoreIdentifier,
        destination: &Path,
        checksum: &str,
        policy: ChecksumPolicy,
    ) -> Result<(), VaultError> {
        match self {
            Self::Remote(remote) => remote.install_into(id, destination, checksum, policy),
            Self::Local(local) => local.install_into(destination),
        }
    }

    /// Form stored in the vault: remote URLs unchanged, local paths absolute
    /// and normalised.
    pub fn canonical_reference(&self) -> Result<ArtifactReference, VaultError> {
        match self {
            Self::Remote(remote) => Ok(ArtifactReference::new(remote.url())),
            Self::Local(local) => Ok(ArtifactReference::new(
                local.absolute_path()?.to_string_lossy().into_owned(),
            )),
        }
    }
}
