//! Module lifecycle orchestration over the vault and the store tree.
//!
//! Each primitive performs at most one vault mutation. Composite `fast_*`
//! operations run primitives in sequence and stop at the first error without
//! compensating for the steps that already succeeded.

use std::path::{Component, Path, PathBuf};

use spicetify_config::{ChecksumPolicy, Config, VaultLayout};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactReference;
use crate::error::VaultError;
use crate::identifier::{ModuleIdentifier, StoreIdentifier, Version};
use crate::link::{ensure_link, remove_entry};
use crate::metadata::Metadata;
use crate::store::{Store, Vault, VaultStore};

const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");

/// Entries of `modules/` that activation links must never replace.
const RESERVED_MODULE_NAMES: &[&str] = &["vault.json", "vault.lock"];

/// Drives add, install, enable, delete, and remove against one vault.
#[derive(Debug, Clone)]
pub struct ModuleManager {
    vault: VaultStore,
    modules_dir: PathBuf,
    store_dir: PathBuf,
    checksum_policy: ChecksumPolicy,
}

impl ModuleManager {
    /// Builds a manager over `layout`.
    #[must_use]
    pub fn new(layout: &VaultLayout, checksum_policy: ChecksumPolicy) -> Self {
        Self {
            vault: VaultStore::new(layout),
            modules_dir: layout.modules_dir().to_path_buf(),
            store_dir: layout.store_dir().to_path_buf(),
            checksum_policy,
        }
    }

    /// Builds a manager from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.layout(), config.checksum_policy)
    }

    /// Underlying vault handle.
    #[must_use]
    pub fn vault(&self) -> &VaultStore {
        &self.vault
    }

    /// Current vault contents.
    pub fn list(&self) -> Result<Vault, VaultError> {
        self.vault.get()
    }

    /// Metadata of the store's first artifact.
    pub fn metadata(&self, id: &StoreIdentifier) -> Result<Metadata, VaultError> {
        let store = self.recorded_store(id)?;
        first_artifact(id, &store)?.resolve().fetch_metadata()
    }

    /// Records a new, uninstalled store with canonicalised artifacts.
    pub fn add(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        id.store_path(&self.store_dir)?;
        self.activation_link(&id.module)?;
        if artifacts.is_empty() {
            return Err(VaultError::precondition(format!(
                "at least one artifact is required for {id}"
            )));
        }
        let artifacts = artifacts
            .iter()
            .map(|reference| reference.resolve().canonical_reference())
            .collect::<Result<Vec<_>, _>>()?;
        let store = Store {
            installed: false,
            artifacts,
            checksum: checksum.to_owned(),
        };
        self.vault.mutate(|vault| {
            vault.set_store(id, store);
            true
        })?;
        info!(target: MANAGER_TARGET, store = %id, "store added");
        Ok(())
    }

    /// Materialises the store's first artifact, then marks it installed.
    ///
    /// The download happens outside the vault lock. A failed install leaves
    /// the store uninstalled and the previous store contents in place.
    pub fn install(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        let store = self.recorded_store(id)?;
        let artifact = first_artifact(id, &store)?.resolve();
        let destination = id.store_path(&self.store_dir)?;

        artifact.install_into(id, &destination, &store.checksum, self.checksum_policy)?;

        self.vault.try_mutate(|vault| {
            let store = vault
                .get_store_mut(id)
                .ok_or_else(|| VaultError::StoreNotFound { id: id.clone() })?;
            store.installed = true;
            Ok(true)
        })?;
        info!(target: MANAGER_TARGET, store = %id, "store installed");
        Ok(())
    }

    /// Makes `id.version` the enabled version; an empty version disables.
    ///
    /// Enabling the already enabled version is a no-op that leaves the
    /// vault bytes and the activation link untouched.
    pub fn enable(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        let link = self.activation_link(&id.module)?;
        let changed = self.vault.try_mutate(|vault| {
            let mut module = vault.get_module(&id.module);
            if module.enabled == id.version {
                return Ok(false);
            }
            let target = if id.version.is_empty() {
                None
            } else {
                match module.versions.get(&id.version) {
                    None => return Err(VaultError::StoreNotFound { id: id.clone() }),
                    Some(store) if !store.installed => {
                        return Err(VaultError::precondition(format!("{id} is not installed")));
                    }
                    Some(_) => Some(id.store_path(&self.store_dir)?),
                }
            };

            module.enabled = id.version.clone();
            vault.set_module(id.module.clone(), module);

            destroy_link(&link);
            if let Some(target) = target {
                ensure_link(&target, &link).map_err(|error| VaultError::io(&link, error))?;
            }
            Ok(true)
        })?;

        if changed {
            info!(target: MANAGER_TARGET, module = %id.module, version = %id.version, "enabled version changed");
        } else {
            debug!(target: MANAGER_TARGET, store = %id, "already enabled");
        }
        Ok(())
    }

    /// Disables the version if enabled, marks it uninstalled, then removes
    /// its store directory.
    ///
    /// A directory removal failure is reported after the vault has been
    /// committed.
    pub fn delete(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        let destination = id.store_path(&self.store_dir)?;
        let link = self.activation_link(&id.module)?;

        self.vault.mutate(|vault| {
            let Some(module) = vault.modules.get_mut(&id.module) else {
                return false;
            };
            let mut changed = false;
            if module.enabled == id.version {
                module.enabled = Version::default();
                destroy_link(&link);
                changed = true;
            }
            if let Some(store) = module.versions.get_mut(&id.version) {
                changed |= store.installed;
                store.installed = false;
            }
            changed
        })?;

        remove_entry(&destination).map_err(|error| VaultError::io(&destination, error))?;
        info!(target: MANAGER_TARGET, store = %id, "store deleted");
        Ok(())
    }

    /// Drops the version entry from the vault. The store tree is untouched.
    pub fn remove(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        let removed = self
            .vault
            .mutate(|vault| vault.remove_store(id).is_some())?;
        if removed {
            info!(target: MANAGER_TARGET, store = %id, "store removed");
        }
        Ok(())
    }

    /// `add` then `install`.
    pub fn fast_install(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        self.add(id, artifacts, checksum)?;
        self.install(id)
    }

    /// `add`, `install`, then `enable`.
    pub fn fast_enable(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        self.fast_install(id, artifacts, checksum)?;
        self.enable(id)
    }

    /// Disables the module, then deletes the version.
    pub fn fast_delete(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        self.enable(&id.with_version(Version::default()))?;
        self.delete(id)
    }

    /// `fast_delete` then `remove`.
    pub fn fast_remove(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        self.fast_delete(id)?;
        self.remove(id)
    }

    /// Directory holding the activation links.
    #[must_use]
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Directory holding the per-version stores.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn recorded_store(&self, id: &StoreIdentifier) -> Result<Store, VaultError> {
        self.vault
            .get()?
            .get_store(id)
            .cloned()
            .ok_or_else(|| VaultError::StoreNotFound { id: id.clone() })
    }

    fn activation_link(&self, module: &ModuleIdentifier) -> Result<PathBuf, VaultError> {
        let relative = module.relative_path()?;
        let reserved = matches!(
            relative.components().next(),
            Some(Component::Normal(first))
                if RESERVED_MODULE_NAMES.iter().any(|name| first == *name)
        );
        if reserved {
            return Err(VaultError::precondition(format!(
                "module identifier '{module}' is reserved"
            )));
        }
        Ok(self.modules_dir.join(relative))
    }
}

fn first_artifact<'a>(
    id: &StoreIdentifier,
    store: &'a Store,
) -> Result<&'a ArtifactReference, VaultError> {
    store
        .artifacts
        .first()
        .ok_or_else(|| VaultError::precondition(format!("{id} has no artifacts")))
}

fn destroy_link(link: &Path) {
    if let Err(error) = remove_entry(link) {
        warn!(
            target: MANAGER_TARGET,
            link = %link.display(),
            %error,
            "failed to remove activation link"
        );
    }
}
