#![cfg(unix)]

mod support;

use std::collections::HashMap;
use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use spicetify_config::{ChecksumPolicy, VaultLayout};
use spicetify_vault::artifact::tree_digest;
use spicetify_vault::hooks::sync_hooks;
use spicetify_vault::{ArtifactReference, ErrorKind, ModuleManager, StoreIdentifier};
use support::{ARCHIVE_FILES, HOOK_FILES, HttpFixture, archive_bytes, hooks_archive_bytes};

const METADATA: &str = r#"{"name":"nord","version":"1.0.0","tags":["dark"]}"#;

fn routes() -> HashMap<String, Vec<u8>> {
    HashMap::from([
        ("/nord.zip".to_owned(), archive_bytes()),
        ("/nord.metadata.json".to_owned(), METADATA.as_bytes().to_vec()),
        ("/hooks.tar.gz".to_owned(), hooks_archive_bytes()),
    ])
}

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn manager(&self, policy: ChecksumPolicy) -> ModuleManager {
        ModuleManager::new(&VaultLayout::new(self.root.path()), policy)
    }

    fn layout(&self) -> VaultLayout {
        VaultLayout::new(self.root.path())
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    Sandbox {
        root: TempDir::new().expect("temp dir"),
    }
}

fn expected_digest() -> String {
    let dir = TempDir::new().expect("temp dir");
    for (name, contents) in ARCHIVE_FILES {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        fs::write(path, contents).expect("write");
    }
    tree_digest(dir.path()).expect("digest")
}

#[rstest]
#[case(true)]
#[case(false)]
fn remote_archive_is_extracted_and_enabled(sandbox: Sandbox, #[case] honour_ranges: bool) {
    let server = HttpFixture::start(routes(), honour_ranges);
    let manager = sandbox.manager(ChecksumPolicy::Warn);
    let id = StoreIdentifier::parse("nord@1.0.0");

    manager
        .fast_enable(&id, &[ArtifactReference::new(server.url("/nord.zip"))], "")
        .expect("fast enable");

    let store = sandbox.layout().store_dir().join("nord/1.0.0");
    assert_eq!(
        fs::read_to_string(store.join("css/app.css")).expect("css"),
        "body { color: #eceff4; }\n"
    );
    let link = sandbox.layout().modules_dir().join("nord");
    assert_eq!(fs::read_link(link).expect("activation link"), store);
    assert_eq!(
        server.ranges().first().cloned().flatten().as_deref(),
        Some("bytes=0-0")
    );
}

#[rstest]
fn remote_metadata_is_fetched_from_sibling_document(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Skip);
    let id = StoreIdentifier::parse("nord@1.0.0");
    manager
        .add(&id, &[ArtifactReference::new(server.url("/nord.zip"))], "")
        .expect("add");

    let metadata = manager.metadata(&id).expect("metadata");

    assert_eq!(metadata.name, "nord");
    assert_eq!(metadata.tags, vec!["dark".to_owned()]);
}

#[rstest]
fn missing_archive_is_not_found(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Warn);
    let id = StoreIdentifier::parse("ghost@1");

    let error = manager
        .fast_install(&id, &[ArtifactReference::new(server.url("/ghost.zip"))], "")
        .expect_err("missing archive");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    let vault = manager.list().expect("list");
    assert!(!vault.get_store(&id).expect("store recorded").installed);
}

#[rstest]
fn enforce_accepts_matching_checksum(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Enforce);
    let id = StoreIdentifier::parse("nord@1.0.0");

    manager
        .fast_install(
            &id,
            &[ArtifactReference::new(server.url("/nord.zip"))],
            &expected_digest(),
        )
        .expect("verified install");

    assert!(manager.list().expect("list").get_store(&id).expect("store").installed);
}

#[rstest]
fn enforce_rejects_mismatch_and_discards_extraction(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Enforce);
    let id = StoreIdentifier::parse("nord@1.0.0");

    let error = manager
        .fast_install(&id, &[ArtifactReference::new(server.url("/nord.zip"))], "00ff")
        .expect_err("mismatch");

    assert_eq!(error.kind(), ErrorKind::Precondition);
    assert!(!sandbox.layout().store_dir().join("nord/1.0.0").exists());
    assert!(!manager.list().expect("list").get_store(&id).expect("store").installed);
}

#[rstest]
fn warn_keeps_mismatching_installation(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Warn);
    let id = StoreIdentifier::parse("nord@1.0.0");

    manager
        .fast_install(&id, &[ArtifactReference::new(server.url("/nord.zip"))], "00ff")
        .expect("warn proceeds");

    assert!(sandbox.layout().store_dir().join("nord/1.0.0/index.js").is_file());
}

#[rstest]
fn remote_install_replaces_a_local_link_without_touching_its_target(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Warn);
    let id = StoreIdentifier::parse("theme@1.0");
    let source = TempDir::new().expect("source dir");
    let user_metadata = r#"{"name":"mine","version":"0.1.0"}"#;
    fs::write(source.path().join("metadata.json"), user_metadata).expect("metadata");
    let local = source.path().to_string_lossy().into_owned();

    manager
        .fast_install(&id, &[ArtifactReference::new(local)], "")
        .expect("local install");
    manager
        .fast_install(&id, &[ArtifactReference::new(server.url("/nord.zip"))], "")
        .expect("remote install");

    let mut names: Vec<String> = fs::read_dir(source.path())
        .expect("source listing")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["metadata.json".to_owned()]);
    assert_eq!(
        fs::read_to_string(source.path().join("metadata.json")).expect("metadata"),
        user_metadata
    );

    let store = sandbox.layout().store_dir().join("theme/1.0");
    let kind = fs::symlink_metadata(&store).expect("store entry").file_type();
    assert!(kind.is_dir() && !kind.is_symlink());
    assert!(store.join("index.js").is_file());
}

#[rstest]
fn reinstall_drops_files_left_by_an_earlier_extraction(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), true);
    let manager = sandbox.manager(ChecksumPolicy::Enforce);
    let id = StoreIdentifier::parse("nord@1.0.0");
    let store = sandbox.layout().store_dir().join("nord/1.0.0");
    fs::create_dir_all(&store).expect("store dir");
    fs::write(store.join("stale.js"), "old").expect("stale file");

    manager
        .fast_install(
            &id,
            &[ArtifactReference::new(server.url("/nord.zip"))],
            &expected_digest(),
        )
        .expect("verified reinstall");

    assert!(!store.join("stale.js").exists());
    assert!(store.join("css/app.css").is_file());
    let leftovers: Vec<_> = fs::read_dir(sandbox.layout().store_dir().join("nord"))
        .expect("module store")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("1.0.0")]);
}

#[rstest]
fn sync_replaces_the_hooks_folder(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), false);
    let hooks = sandbox.layout().hooks_dir().to_path_buf();
    fs::create_dir_all(&hooks).expect("hooks dir");
    fs::write(hooks.join("stale.js"), "old").expect("stale hook");

    let count = sync_hooks(&server.url("/hooks.tar.gz"), &hooks).expect("sync");

    assert_eq!(count, HOOK_FILES.len());
    assert!(!hooks.join("stale.js").exists());
    for (name, contents) in HOOK_FILES {
        assert_eq!(fs::read_to_string(hooks.join(name)).expect("hook"), *contents);
    }
}

#[rstest]
fn failed_sync_keeps_existing_hooks(sandbox: Sandbox) {
    let server = HttpFixture::start(routes(), false);
    let hooks = sandbox.layout().hooks_dir().to_path_buf();
    fs::create_dir_all(&hooks).expect("hooks dir");
    fs::write(hooks.join("current.js"), "current").expect("hook");

    let error = sync_hooks(&server.url("/missing.tar.gz"), &hooks).expect_err("missing release");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(hooks.join("current.js").is_file());
}
