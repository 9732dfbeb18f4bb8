//! Persistent vault document and its locked read-modify-write cycle.
//!
//! The vault is a single JSON file rewritten whole on every mutation. Writes
//! go through a temporary file in the same directory followed by a rename,
//! and each mutation holds an exclusive advisory lock on `vault.lock` for its
//! whole cycle so concurrent CLI and daemon processes never lose updates.
//! Readers do not lock: the rename makes every observed document complete.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use spicetify_config::VaultLayout;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::artifact::ArtifactReference;
use crate::error::VaultError;
use crate::identifier::{ModuleIdentifier, StoreIdentifier, Version};

const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");

/// One installable version of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Store {
    /// Whether the artifact has been materialised under `store/`.
    #[serde(rename = "Installed", default)]
    pub installed: bool,
    /// Artifact references; only the first is consulted.
    #[serde(rename = "Artifacts", default)]
    pub artifacts: Vec<ArtifactReference>,
    /// Recorded checksum of the installed tree, possibly empty.
    #[serde(rename = "Checksum", default)]
    pub checksum: String,
}

/// All known versions of a module and the enabled one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Module {
    /// Enabled version; empty when the module is disabled.
    #[serde(rename = "Enabled", default)]
    pub enabled: Version,
    /// Known versions.
    #[serde(rename = "V", default)]
    pub versions: BTreeMap<Version, Store>,
}

/// The whole vault document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Vault {
    /// Modules keyed by identifier.
    #[serde(rename = "Modules", default)]
    pub modules: BTreeMap<ModuleIdentifier, Module>,
}

impl Vault {
    /// Module state; a missing module reads as disabled with no versions.
    #[must_use]
    pub fn get_module(&self, id: &ModuleIdentifier) -> Module {
        self.modules.get(id).cloned().unwrap_or_default()
    }

    /// Replaces the module state.
    pub fn set_module(&mut self, id: ModuleIdentifier, module: Module) {
        self.modules.insert(id, module);
    }

    /// Store for a module version, if recorded.
    #[must_use]
    pub fn get_store(&self, id: &StoreIdentifier) -> Option<&Store> {
        self.modules.get(&id.module)?.versions.get(&id.version)
    }

    /// Mutable store for a module version, if recorded.
    pub fn get_store_mut(&mut self, id: &StoreIdentifier) -> Option<&mut Store> {
        self.modules.get_mut(&id.module)?.versions.get_mut(&id.version)
    }

    /// Records a store, creating the module entry when needed.
    pub fn set_store(&mut self, id: &StoreIdentifier, store: Store) {
        self.modules
            .entry(id.module.clone())
            .or_default()
            .versions
            .insert(id.version.clone(), store);
    }

    /// Drops a store entry, returning it.
    pub fn remove_store(&mut self, id: &StoreIdentifier) -> Option<Store> {
        self.modules.get_mut(&id.module)?.versions.remove(&id.version)
    }

    /// Checks every module that differs from `before`: a non-empty enabled
    /// version must name an installed store.
    fn validate_changes(&self, before: &Self) -> Result<(), VaultError> {
        for (id, module) in &self.modules {
            if before.modules.get(id) == Some(module) || module.enabled.is_empty() {
                continue;
            }
            match module.versions.get(&module.enabled) {
                Some(store) if store.installed => {}
                Some(_) => {
                    return Err(VaultError::precondition(format!(
                        "enabled version {id}@{} is not installed",
                        module.enabled
                    )));
                }
                None => {
                    return Err(VaultError::precondition(format!(
                        "enabled version {id}@{} is not recorded",
                        module.enabled
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Handle to the vault document and its lock file.
#[derive(Debug, Clone)]
pub struct VaultStore {
    vault_path: PathBuf,
    lock_path: PathBuf,
}

impl VaultStore {
    /// Opens the vault described by `layout`. Nothing is touched on disk.
    #[must_use]
    pub fn new(layout: &VaultLayout) -> Self {
        Self {
            vault_path: layout.vault_path().to_path_buf(),
            lock_path: layout.lock_path().to_path_buf(),
        }
    }

    /// Path of the vault document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.vault_path
    }

    /// Reads the vault. A missing file is an empty vault.
    pub fn get(&self) -> Result<Vault, VaultError> {
        let bytes = match fs::read(&self.vault_path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vault::default()),
            Err(error) => return Err(VaultError::io(&self.vault_path, error)),
        };
        serde_json::from_slice(&bytes).map_err(|source| VaultError::Decode {
            location: self.vault_path.display().to_string(),
            source,
        })
    }

    /// Applies `mutation` under the lock; writes when it returns `true`.
    ///
    /// Returns whether the document was written.
    pub fn mutate<F>(&self, mutation: F) -> Result<bool, VaultError>
    where
        F: FnOnce(&mut Vault) -> bool,
    {
        self.try_mutate(|vault| Ok(mutation(vault)))
    }

    /// Fallible form of [`VaultStore::mutate`]; an error aborts without
    /// writing.
    pub fn try_mutate<F>(&self, mutation: F) -> Result<bool, VaultError>
    where
        F: FnOnce(&mut Vault) -> Result<bool, VaultError>,
    {
        let _lock = self.lock()?;
        let before = self.get()?;
        let mut vault = before.clone();
        if !mutation(&mut vault)? {
            debug!(target: STORE_TARGET, "mutation left vault unchanged");
            return Ok(false);
        }
        vault.validate_changes(&before)?;
        self.write(&vault)?;
        Ok(true)
    }

    /// Replaces the vault with an empty document.
    pub fn reset(&self) -> Result<(), VaultError> {
        let _lock = self.lock()?;
        self.write(&Vault::default())
    }

    fn lock(&self) -> Result<VaultLock, VaultError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|error| VaultError::io(parent, error))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|error| VaultError::io(&self.lock_path, error))?;
        FileExt::lock_exclusive(&file).map_err(|error| VaultError::io(&self.lock_path, error))?;
        Ok(VaultLock { _file: file })
    }

    fn write(&self, vault: &Vault) -> Result<(), VaultError> {
        let directory = self
            .vault_path
            .parent()
            .ok_or_else(|| VaultError::precondition("vault path has no parent directory"))?;
        fs::create_dir_all(directory).map_err(|error| VaultError::io(directory, error))?;

        let mut temp =
            NamedTempFile::new_in(directory).map_err(|error| VaultError::io(directory, error))?;
        serde_json::to_writer_pretty(&mut temp, vault).map_err(VaultError::Encode)?;
        temp.write_all(b"\n")
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|error| VaultError::io(temp.path(), error))?;
        temp.persist(&self.vault_path)
            .map_err(|error| VaultError::io(&self.vault_path, error.error))?;
        debug!(target: STORE_TARGET, path = %self.vault_path.display(), "vault written");
        Ok(())
    }
}

/// Exclusive lock, released when the handle closes.
struct VaultLock {
    _file: File,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;

    struct Sandbox {
        _dir: TempDir,
        store: VaultStore,
    }

    #[fixture]
    fn sandbox() -> Sandbox {
        let dir = TempDir::new().expect("temp dir");
        let store = VaultStore::new(&VaultLayout::new(dir.path()));
        Sandbox { _dir: dir, store }
    }

    fn installed(reference: &str) -> Store {
        Store {
            installed: true,
            artifacts: vec![ArtifactReference::from(reference)],
            checksum: String::new(),
        }
    }

    #[rstest]
    fn missing_vault_reads_empty(sandbox: Sandbox) {
        assert_eq!(sandbox.store.get().expect("get"), Vault::default());
    }

    #[rstest]
    fn malformed_vault_is_a_decode_error(sandbox: Sandbox) {
        let path = sandbox.store.path();
        fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        fs::write(path, "{\"Modules\": [").expect("write");
        assert_eq!(sandbox.store.get().expect_err("must fail").kind(), ErrorKind::Decode);
    }

    #[rstest]
    fn document_uses_wire_field_names(sandbox: Sandbox) {
        let id = StoreIdentifier::new("theme", "1.0");
        sandbox
            .store
            .mutate(|vault| {
                vault.set_store(&id, installed("/src/theme"));
                true
            })
            .expect("mutate");
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(sandbox.store.path()).expect("read")).expect("json");
        assert_eq!(
            raw["Modules"]["theme"]["V"]["1.0"]["Artifacts"][0],
            serde_json::json!("/src/theme")
        );
        assert_eq!(raw["Modules"]["theme"]["Enabled"], serde_json::json!(""));
    }

    #[rstest]
    fn declined_mutation_does_not_write(sandbox: Sandbox) {
        let written = sandbox
            .store
            .mutate(|vault| {
                vault.set_store(&StoreIdentifier::new("m", "1"), Store::default());
                false
            })
            .expect("mutate");
        assert!(!written);
        assert!(!sandbox.store.path().exists());
    }

    #[rstest]
    fn failed_mutation_does_not_write(sandbox: Sandbox) {
        let result = sandbox.store.try_mutate(|vault| {
            vault.set_store(&StoreIdentifier::new("m", "1"), Store::default());
            Err(VaultError::precondition("abort"))
        });
        assert!(result.is_err());
        assert!(!sandbox.store.path().exists());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn enabling_requires_an_installed_version(sandbox: Sandbox, #[case] recorded: bool) {
        let error = sandbox
            .store
            .mutate(|vault| {
                let mut module = Module {
                    enabled: Version::new("1"),
                    ..Module::default()
                };
                if recorded {
                    module.versions.insert(Version::new("1"), Store::default());
                }
                vault.set_module(ModuleIdentifier::new("m"), module);
                true
            })
            .expect_err("must reject");
        assert_eq!(error.kind(), ErrorKind::Precondition);
        assert!(!sandbox.store.path().exists());
    }

    #[rstest]
    fn untouched_modules_are_not_revalidated(sandbox: Sandbox) {
        let path = sandbox.store.path().to_path_buf();
        fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        fs::write(
            &path,
            r#"{"Modules":{"hand":{"Enabled":"9","V":{}}}}"#,
        )
        .expect("seed");

        sandbox
            .store
            .mutate(|vault| {
                vault.set_store(&StoreIdentifier::new("other", "1"), Store::default());
                true
            })
            .expect("unrelated mutation succeeds");
        let vault = sandbox.store.get().expect("get");
        assert_eq!(vault.get_module(&ModuleIdentifier::new("hand")).enabled.as_str(), "9");
    }

    #[rstest]
    fn concurrent_mutators_do_not_lose_updates(sandbox: Sandbox) {
        let store = Arc::new(sandbox.store.clone());
        let workers: Vec<_> = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for round in 0..5 {
                        let id = StoreIdentifier::new(format!("m{index}"), format!("{round}"));
                        store
                            .mutate(|vault| {
                                vault.set_store(&id, Store::default());
                                true
                            })
                            .expect("mutate");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        let vault = store.get().expect("get");
        let total: usize = vault.modules.values().map(|m| m.versions.len()).sum();
        assert_eq!(total, 40);
    }

    #[rstest]
    fn reset_writes_empty_vault(sandbox: Sandbox) {
        sandbox
            .store
            .mutate(|vault| {
                vault.set_store(&StoreIdentifier::new("m", "1"), Store::default());
                true
            })
            .expect("mutate");
        sandbox.store.reset().expect("reset");
        assert_eq!(sandbox.store.get().expect("get"), Vault::default());
        assert!(sandbox.store.path().exists());
    }

    #[test]
    fn missing_module_reads_as_default() {
        let module = Vault::default().get_module(&ModuleIdentifier::new("absent"));
        assert!(module.enabled.is_empty());
        assert!(module.versions.is_empty());
    }
}
