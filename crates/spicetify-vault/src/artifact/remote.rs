//! Artifacts published as `.zip` archives over HTTP(S).

use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use spicetify_config::ChecksumPolicy;
use tempfile::TempDir;
use tracing::{debug, info};
use zip::ZipArchive;

use super::checksum::verify_store;
use super::range::{RangeReader, RangeSource};
use crate::error::VaultError;
use crate::identifier::StoreIdentifier;
use crate::link::remove_entry;
use crate::metadata::Metadata;

const REMOTE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::remote");

/// Per-request timeout for metadata and archive ranges.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const ARCHIVE_SUFFIX: &str = ".zip";
const METADATA_SUFFIX: &str = ".metadata.json";
const STAGING_PREFIX: &str = ".staging-";

/// An artifact addressed by an HTTP(S) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    url: String,
}

impl RemoteArtifact {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Archive URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sibling metadata URL: the `.zip` suffix replaced by `.metadata.json`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Precondition`] when the URL does not end in
    /// `.zip`.
    pub fn metadata_url(&self) -> Result<String, VaultError> {
        self.url
            .strip_suffix(ARCHIVE_SUFFIX)
            .map(|base| format!("{base}{METADATA_SUFFIX}"))
            .ok_or_else(|| {
                VaultError::precondition(format!(
                    "artifact URL '{}' must end with {ARCHIVE_SUFFIX}",
                    self.url
                ))
            })
    }

    /// Downloads and decodes the metadata document.
    pub fn fetch_metadata(&self) -> Result<Metadata, VaultError> {
        let url = self.metadata_url()?;
        debug!(target: REMOTE_TARGET, url = %url, "fetching metadata");
        let response = http_agent()
            .get(&url)
            .call()
            .map_err(|error| map_ureq_error(&url, &error))?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| VaultError::network(&url, error))?;
        Metadata::from_slice(&bytes).map_err(|source| VaultError::Decode {
            location: url,
            source,
        })
    }

    /// Streams the archive and extracts it into `destination`.
    ///
    /// The archive is unpacked into a sibling staging folder and verified
    /// there. Only then is whatever occupied `destination` (a link to a local
    /// folder, or an earlier extraction) removed and the staging folder
    /// renamed into place. Any failure discards the staging folder and leaves
    /// `destination` untouched.
    pub fn install_into(
        &self,
        id: &StoreIdentifier,
        destination: &Path,
        checksum: &str,
        policy: ChecksumPolicy,
    ) -> Result<(), VaultError> {
        info!(target: REMOTE_TARGET, store = %id, url = %self.url, "downloading archive");
        let staging = staging_dir(destination)?;
        let reader = open_archive(&self.url)?;
        let mut archive =
            ZipArchive::new(reader).map_err(|error| VaultError::archive(&self.url, error))?;
        archive
            .extract(staging.path())
            .map_err(|error| VaultError::archive(&self.url, error))?;

        verify_store(policy, id, staging.path(), checksum)?;

        remove_entry(destination).map_err(|error| VaultError::io(destination, error))?;
        fs::rename(staging.path(), destination)
            .map_err(|error| VaultError::io(destination, error))?;
        info!(target: REMOTE_TARGET, store = %id, "archive extracted");
        Ok(())
    }
}

/// Empty folder beside `destination`, deleted on drop unless renamed away.
fn staging_dir(destination: &Path) -> Result<TempDir, VaultError> {
    let parent = destination.parent().ok_or_else(|| {
        VaultError::precondition(format!(
            "store path '{}' has no parent",
            destination.display()
        ))
    })?;
    fs::create_dir_all(parent).map_err(|error| VaultError::io(parent, error))?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|error| VaultError::io(parent, error))
}

/// Archive body: ranged when the server honours `Range`, otherwise buffered.
#[derive(Debug)]
pub enum RemoteArchive {
    /// Fetched window by window.
    Ranged(RangeReader<HttpRangeSource>),
    /// Downloaded in full.
    Buffered(Cursor<Vec<u8>>),
}

impl Read for RemoteArchive {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Ranged(reader) => reader.read(buf),
            Self::Buffered(reader) => reader.read(buf),
        }
    }
}

impl Seek for RemoteArchive {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Ranged(reader) => reader.seek(pos),
            Self::Buffered(reader) => reader.seek(pos),
        }
    }
}

/// Probes `url` with a one-byte range request and picks a reader.
pub fn open_archive(url: &str) -> Result<RemoteArchive, VaultError> {
    let response = http_agent()
        .get(url)
        .header("Range", "bytes=0-0")
        .call()
        .map_err(|error| map_ureq_error(url, &error))?;

    match response.status().as_u16() {
        206 => {
            let length = response
                .headers()
                .get("content-range")
                .and_then(|value| value.to_str().ok())
                .and_then(total_length)
                .ok_or_else(|| {
                    VaultError::network(url, "missing or malformed Content-Range header")
                })?;
            debug!(target: REMOTE_TARGET, url, length, "server supports ranges");
            Ok(RemoteArchive::Ranged(RangeReader::new(HttpRangeSource {
                url: url.to_owned(),
                length,
            })))
        }
        200 => {
            debug!(target: REMOTE_TARGET, url, "server ignored range, buffering body");
            let mut bytes = Vec::new();
            response
                .into_body()
                .as_reader()
                .read_to_end(&mut bytes)
                .map_err(|error| VaultError::network(url, error))?;
            Ok(RemoteArchive::Buffered(Cursor::new(bytes)))
        }
        status => Err(VaultError::network(url, format!("unexpected status {status}"))),
    }
}

/// Total length from a `Content-Range: bytes a-b/total` value.
fn total_length(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Byte ranges of a remote archive fetched with `Range` requests.
#[derive(Debug)]
pub struct HttpRangeSource {
    url: String,
    length: u64,
}

impl RangeSource for HttpRangeSource {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_range(&self, start: u64, length: usize) -> io::Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let end = start + length as u64 - 1;
        let response = http_agent()
            .get(&self.url)
            .header("Range", format!("bytes={start}-{end}"))
            .call()
            .map_err(io::Error::other)?;
        if response.status().as_u16() != 206 {
            return Err(io::Error::other(format!(
                "expected partial content from {}, got status {}",
                self.url,
                response.status()
            )));
        }
        let mut bytes = Vec::with_capacity(length);
        response
            .into_body()
            .as_reader()
            .take(length as u64)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Shared `ureq` agent for artifact downloads.
pub(crate) fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Maps a transport error, turning HTTP 404 into [`VaultError::NotFound`].
pub(crate) fn map_ureq_error(url: &str, error: &ureq::Error) -> VaultError {
    match error {
        ureq::Error::StatusCode(404) => VaultError::not_found(url),
        other => VaultError::network(url, other),
    }
}
