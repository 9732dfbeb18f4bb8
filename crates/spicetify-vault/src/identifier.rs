//! Value types addressing modules, versions, and installed stores.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Name of a logical module, optionally namespace-qualified with `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ModuleIdentifier(String);

impl ModuleIdentifier {
    /// Wraps a module name.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the module name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of this module relative to a base directory.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Precondition`] when the name is empty, absolute,
    /// or contains anything other than plain path segments.
    pub fn relative_path(&self) -> Result<PathBuf, VaultError> {
        relative_segments(&self.0, "module identifier")
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque version label. Empty means "no version".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wraps a version label.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the version label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A module paired with one of its versions.
///
/// The textual form is `<module>@<version>`. Parsing splits at the last `@`
/// that is not the first character, so `@scope/name@1.0` names module
/// `@scope/name` at version `1.0` and `theme` names module `theme` with an
/// empty version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoreIdentifier {
    /// Module part.
    pub module: ModuleIdentifier,
    /// Version part.
    pub version: Version,
}

impl StoreIdentifier {
    /// Builds an identifier from its parts.
    pub fn new(module: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module: ModuleIdentifier::new(module),
            version: Version::new(version),
        }
    }

    /// Parses the textual `<module>@<version>` form. Never fails.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('@') {
            Some((module, version)) if !module.is_empty() => Self::new(module, version),
            _ => Self::new(text, ""),
        }
    }

    /// Same module with a different version.
    #[must_use]
    pub fn with_version(&self, version: Version) -> Self {
        Self {
            module: self.module.clone(),
            version,
        }
    }

    /// Location of this store below `store_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Precondition`] when either part cannot be
    /// mapped to a contained relative path, including an empty version.
    pub fn store_path(&self, store_dir: &Path) -> Result<PathBuf, VaultError> {
        let module = self.module.relative_path()?;
        let version = relative_segments(self.version.as_str(), "version")?;
        if version.components().count() != 1 {
            return Err(VaultError::precondition(format!(
                "version '{}' must be a single path segment",
                self.version
            )));
        }
        Ok(store_dir.join(module).join(version))
    }
}

impl fmt::Display for StoreIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.module)
        } else {
            write!(f, "{}@{}", self.module, self.version)
        }
    }
}

fn relative_segments(text: &str, what: &str) -> Result<PathBuf, VaultError> {
    if text.is_empty() {
        return Err(VaultError::precondition(format!("{what} must not be empty")));
    }
    let path = Path::new(text);
    let contained = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !contained {
        return Err(VaultError::precondition(format!(
            "{what} '{text}' must be a relative path without '..'"
        )));
    }
    Ok(path.to_path_buf())
}
