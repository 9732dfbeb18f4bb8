//! Module descriptor published next to every artifact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded `metadata.json`. Unknown fields are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Published version.
    #[serde(default)]
    pub version: String,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author handles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Remaining fields (entries, dependencies, preview, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Decodes a metadata document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
