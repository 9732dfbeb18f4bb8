//! Enumerated configuration options shared by the CLI and the daemon.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format for structured log events.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}

/// How recorded checksums are treated when a remote artifact is installed.
///
/// The digest is a SHA-256 over the extracted store tree, so the value a
/// module author publishes is independent of how the archive was compressed.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChecksumPolicy {
    /// Never compute a digest.
    Skip,
    /// Compute the digest when a checksum is recorded and log a warning on
    /// mismatch, but keep the installation.
    #[default]
    Warn,
    /// Fail the installation when the checksum is missing or does not match.
    Enforce,
}

impl ChecksumPolicy {
    /// Returns true when a mismatch or missing checksum must abort the install.
    #[must_use]
    pub const fn fails_closed(self) -> bool {
        matches!(self, Self::Enforce)
    }
}

/// Errors encountered while parsing an option from text.
pub type OptionParseError = strum::ParseError;
