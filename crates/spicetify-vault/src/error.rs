//! Error types shared by the vault, resolver, manager, and dispatcher.
//!
//! Every failure carries the path, URL, or identifier it concerns and can be
//! classified through [`VaultError::kind`] so callers (the protocol reply, CLI
//! exit codes, daemon logs) can react to the category without matching on
//! individual variants.

use std::io;
use std::path::{Path, PathBuf};

use strum::Display;
use thiserror::Error;

use crate::identifier::StoreIdentifier;

/// Coarse failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A store, module version, or metadata document does not exist.
    NotFound,
    /// Local filesystem failure.
    Io,
    /// HTTP transport failure or unexpected status.
    Network,
    /// A document or archive could not be decoded.
    Decode,
    /// The vault could not be serialised.
    Encode,
    /// The requested action is not part of the protocol.
    UnsupportedOperation,
    /// Arguments or vault state rule the operation out.
    Precondition,
}

/// Errors surfaced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No store is recorded for the identifier.
    #[error("no store recorded for {id}")]
    StoreNotFound {
        /// Identifier that was looked up.
        id: StoreIdentifier,
    },

    /// Remote resource or local document is missing.
    #[error("nothing found at {location}")]
    NotFound {
        /// URL or path that was requested.
        location: String,
    },

    /// Filesystem operation failed.
    #[error("IO error at '{path}': {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// HTTP request failed or returned an unexpected status.
    #[error("request to {url} failed: {reason}")]
    Network {
        /// URL that was requested.
        url: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// JSON document could not be decoded.
    #[error("failed to decode {location}: {source}")]
    Decode {
        /// URL or path of the document.
        location: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Archive could not be read.
    #[error("failed to read archive {location}: {source}")]
    Archive {
        /// URL of the archive.
        location: String,
        /// Archive error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Compressed tar stream could not be read.
    #[error("failed to unpack archive into '{path}': {source}")]
    Unpack {
        /// Destination of the unpacked entries.
        path: PathBuf,
        /// Decompression or tar error.
        #[source]
        source: io::Error,
    },

    /// Archive holds no entries.
    #[error("archive unpacked into '{path}' has no entries")]
    EmptyArchive {
        /// Destination of the unpacked entries.
        path: PathBuf,
    },

    /// Vault could not be serialised.
    #[error("failed to encode vault: {0}")]
    Encode(#[source] serde_json::Error),

    /// Protocol action is not recognised.
    #[error("unsupported action '{action}'")]
    UnsupportedOperation {
        /// Action text as received.
        action: String,
    },

    /// Arguments or state rule the operation out.
    #[error("precondition failed: {reason}")]
    Precondition {
        /// What was violated.
        reason: String,
    },

    /// Installed tree does not match the recorded checksum.
    #[error("checksum mismatch for {id}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// Store being installed.
        id: StoreIdentifier,
        /// Recorded checksum.
        expected: String,
        /// Digest of the extracted tree.
        actual: String,
    },
}

impl VaultError {
    /// Returns the failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreNotFound { .. } | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Io,
            Self::Network { .. } => ErrorKind::Network,
            Self::Decode { .. }
            | Self::Archive { .. }
            | Self::Unpack { .. }
            | Self::EmptyArchive { .. } => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::Precondition { .. } | Self::ChecksumMismatch { .. } => ErrorKind::Precondition,
        }
    }

    /// Creates an IO error for `path`.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a not-found error for a URL or path.
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    /// Creates a precondition error.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    /// Maps an archive error. IO failures while streaming come from the
    /// ranged HTTP reader and are reported as network errors.
    pub(crate) fn archive(location: impl Into<String>, source: zip::result::ZipError) -> Self {
        match source {
            zip::result::ZipError::Io(error) => Self::Network {
                url: location.into(),
                reason: error.to_string(),
            },
            other => Self::Archive {
                location: location.into(),
                source: other,
            },
        }
    }
}
