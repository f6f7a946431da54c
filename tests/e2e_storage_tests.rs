//! End-to-end tests for the file store: transfers, transactional coupling of
//! filesystem and catalog, lookups and paging.

mod common;

use chrono::{Duration, Utc};
use common::TestEnv;
use fonoteca::paging::PageRequest;
use fonoteca::storage::{StorageError, StoreFileCommand, TransferKind};
use std::fs;
use std::path::PathBuf;

fn write_source(env: &TestEnv, name: &str, content: &[u8]) -> PathBuf {
    let path = env.dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn png_command(source: PathBuf) -> StoreFileCommand {
    StoreFileCommand::new(
        source,
        TransferKind::Copy,
        "image/png",
        "checksum-1",
        "artworkExternal",
    )
}

// =============================================================================
// Transfers
// =============================================================================

#[test]
fn test_copy_save_retains_source_and_round_trips() {
    let env = TestEnv::new();
    let source = write_source(&env, "in.png", b"png-bytes");

    let row = env
        .files
        .save(&png_command(source.clone()).with_name("cover"))
        .unwrap();

    assert!(source.exists());
    assert_eq!(row.tag, "artworkExternal");
    assert_eq!(row.checksum, "checksum-1");
    assert_eq!(row.mime_type, "image/png");
    assert_eq!(row.size, 9);
    assert!(row.relative_path.ends_with("cover.png"));
    assert_eq!(
        fs::read(env.files.absolute_path(&row)).unwrap(),
        b"png-bytes"
    );

    let reloaded = env.files.by_id(row.id).unwrap().unwrap();
    assert_eq!(reloaded, row);
}

#[test]
fn test_move_save_removes_source() {
    let env = TestEnv::new();
    let source = write_source(&env, "in.png", b"png-bytes");

    let mut command = png_command(source.clone());
    command.transfer = TransferKind::Move;
    let row = env.files.save(&command).unwrap();

    assert!(!source.exists());
    assert_eq!(
        fs::read(env.files.absolute_path(&row)).unwrap(),
        b"png-bytes"
    );
}

#[test]
fn test_save_rejects_missing_source() {
    let env = TestEnv::new();
    let result = env.files.save(&png_command(env.dir.path().join("nope.png")));
    assert!(matches!(result, Err(StorageError::InvalidInput(_))));
    assert_eq!(env.files.count().unwrap(), 0);
}

// =============================================================================
// No implicit deduplication
// =============================================================================

#[test]
fn test_same_content_saved_twice_yields_two_files() {
    let env = TestEnv::new();
    let first = env
        .files
        .save(&png_command(write_source(&env, "a.png", b"same")))
        .unwrap();
    let second = env
        .files
        .save(&png_command(write_source(&env, "b.png", b"same")))
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.relative_path, second.relative_path);
    assert_eq!(env.files.count().unwrap(), 2);
    assert_eq!(env.files.by_checksum("checksum-1").unwrap().len(), 2);
}

#[test]
fn test_by_tag_and_checksum_finds_dedup_candidate() {
    let env = TestEnv::new();
    let row = env
        .files
        .save(&png_command(write_source(&env, "a.png", b"data")))
        .unwrap();

    let found = env
        .files
        .by_tag_and_checksum("artworkExternal", "checksum-1")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, row.id);

    assert!(env
        .files
        .by_tag_and_checksum("artworkEmbedded", "checksum-1")
        .unwrap()
        .is_none());
    assert!(env
        .files
        .by_tag_and_checksum("artworkExternal", "other")
        .unwrap()
        .is_none());
}

// =============================================================================
// Transactional coupling
// =============================================================================

#[test]
fn test_rollback_discards_written_file_and_row() {
    let env = TestEnv::new();
    let source = write_source(&env, "in.png", b"data");

    let mut stored_path = None;
    let result = env.db.unit_of_work(|uow| {
        let row = env.files.save_in(uow, &png_command(source.clone()))?;
        stored_path = Some(env.files.absolute_path(&row));
        Err::<(), anyhow::Error>(anyhow::anyhow!("boom"))
    });

    assert!(result.is_err());
    assert!(!stored_path.unwrap().exists());
    assert_eq!(env.files.count().unwrap(), 0);
    // The copy source is untouched by the rollback.
    assert!(source.exists());
}

#[test]
fn test_delete_removes_file_after_commit() {
    let env = TestEnv::new();
    let row = env
        .files
        .save(&png_command(write_source(&env, "a.png", b"data")))
        .unwrap();
    let physical = env.files.absolute_path(&row);
    assert!(physical.exists());

    assert!(env.files.delete(row.id).unwrap());
    assert!(!physical.exists());
    assert!(env.files.by_id(row.id).unwrap().is_none());

    // Deleting an absent row is a no-op.
    assert!(!env.files.delete(row.id).unwrap());
}

#[test]
fn test_rolled_back_delete_preserves_file_and_row() {
    let env = TestEnv::new();
    let row = env
        .files
        .save(&png_command(write_source(&env, "a.png", b"data")))
        .unwrap();
    let physical = env.files.absolute_path(&row);

    let result = env.db.unit_of_work(|uow| {
        env.files.delete_in(uow, row.id)?;
        Err::<(), anyhow::Error>(anyhow::anyhow!("boom"))
    });

    assert!(result.is_err());
    assert!(physical.exists());
    assert!(env.files.by_id(row.id).unwrap().is_some());
}

#[test]
fn test_delete_all_clears_rows_and_storage_root() {
    let env = TestEnv::new();
    env.files
        .save(&png_command(write_source(&env, "a.png", b"one")))
        .unwrap();
    env.files
        .save(&png_command(write_source(&env, "b.png", b"two")))
        .unwrap();

    env.files.delete_all().unwrap();

    assert_eq!(env.files.count().unwrap(), 0);
    let root = env.files.files_root();
    assert!(root.is_dir());
    assert_eq!(fs::read_dir(root).unwrap().count(), 0);
}

// =============================================================================
// Lookups, paging, stats
// =============================================================================

#[test]
fn test_paging_and_tag_stats() {
    let env = TestEnv::new();
    for i in 0..3 {
        let mut command = png_command(write_source(
            &env,
            &format!("ext{}.png", i),
            b"four",
        ));
        command.checksum = format!("ext-{}", i);
        env.files.save(&command).unwrap();
    }
    let mut embedded = png_command(write_source(&env, "emb.png", b"embedded"));
    embedded.tag = "artworkEmbedded".to_string();
    embedded.checksum = "emb-0".to_string();
    env.files.save(&embedded).unwrap();

    let page = env
        .files
        .page_by_tag("artworkExternal", PageRequest { number: 0, size: 2 })
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_elements, 3);
    let rest = env
        .files
        .page_by_tag("artworkExternal", PageRequest { number: 1, size: 2 })
        .unwrap();
    assert_eq!(rest.items.len(), 1);

    let all = env
        .files
        .page(PageRequest { number: 0, size: 10 })
        .unwrap();
    assert_eq!(all.items.len(), 4);

    assert_eq!(env.files.count().unwrap(), 4);
    assert_eq!(env.files.count_by_tag("artworkExternal").unwrap(), 3);
    assert_eq!(env.files.count_by_tag("artworkEmbedded").unwrap(), 1);
    // 3 files of 4 bytes each.
    assert_eq!(env.files.size_by_tag("artworkExternal").unwrap(), 12);

    let past = Utc::now() - Duration::hours(1);
    let future = Utc::now() + Duration::hours(1);
    assert_eq!(
        env.files
            .count_by_tag_since("artworkExternal", past)
            .unwrap(),
        3
    );
    assert_eq!(
        env.files
            .count_by_tag_since("artworkExternal", future)
            .unwrap(),
        0
    );
}
