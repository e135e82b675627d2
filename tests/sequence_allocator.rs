mod common;

use std::sync::Arc;

use common::builders::{
    ConfigFileBuilder, MOCK_SEQUENCE_PATH, file_allocator, mock_allocator, shared_mock_allocator,
};
use common::{TestResult, init_tracing};
use envlane::errors::{EnvlaneError, StoreError};
use envlane::fs::MockFileSystem;
use envlane::sequence::{
    MemorySequenceStore, SequenceAllocator, SequenceStore, TableSequenceStore,
};
use tempfile::tempdir;

#[tokio::test]
async fn first_id_from_empty_run_dir_is_one() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let run_dir = dir.path().join("nested").join("run");
    let allocator = file_allocator(&run_dir);

    assert_eq!(allocator.current().await, 0);
    assert_eq!(allocator.next().await.unwrap(), 1);
    assert!(run_dir.is_dir(), "run directory should be created on demand");
    assert_eq!(std::fs::read_to_string(run_dir.join("sequence"))?, "1");
    Ok(())
}

#[tokio::test]
async fn restart_continues_from_persisted_value() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let first = file_allocator(dir.path());
    for expected in 1..=3 {
        assert_eq!(first.next().await.unwrap(), expected);
    }
    drop(first);

    let second = file_allocator(dir.path());
    assert_eq!(second.current().await, 3);
    assert_eq!(second.next().await.unwrap(), 4);
    Ok(())
}

#[tokio::test]
async fn base_is_a_floor_not_an_offset() {
    init_tracing();
    let fs = MockFileSystem::new();
    let allocator = mock_allocator(&fs).with_base(100);
    assert_eq!(allocator.next().await.unwrap(), 101);

    // A local value above the base wins.
    fs.add_file(MOCK_SEQUENCE_PATH, "250");
    assert_eq!(allocator.next().await.unwrap(), 251);
}

#[tokio::test]
async fn exhausted_counter_is_an_error_and_persists_nothing() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, u64::MAX.to_string());
    let store = MemorySequenceStore::with_value(3);
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));

    let err = allocator.next().await.unwrap_err();
    assert!(matches!(err, EnvlaneError::SequenceExhausted(u64::MAX)), "got {err:?}");
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH), Some(u64::MAX.to_string()));
    assert_eq!(store.update_calls(), 0);

    // Still refusing on the next call rather than wrapping.
    assert!(allocator.next().await.is_err());
}

#[tokio::test]
async fn base_at_the_maximum_is_exhausted_from_the_start() {
    init_tracing();
    let fs = MockFileSystem::new();
    let allocator = mock_allocator(&fs).with_base(u64::MAX);

    assert!(matches!(
        allocator.next().await,
        Err(EnvlaneError::SequenceExhausted(u64::MAX))
    ));
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH), None);
}

#[tokio::test]
async fn last_issued_reads_without_side_effects() {
    init_tracing();
    let fs = MockFileSystem::new();
    let store = MemorySequenceStore::without_table();
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone())).with_base(10);

    assert_eq!(allocator.last_issued().await, 10);
    assert!(!store.table_exists());
    assert_eq!(store.ensure_calls(), 0);
    assert!(!fs.has_dir("/run/envlane"), "run directory must not be created");
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH), None);
}

#[tokio::test]
async fn last_issued_takes_the_highest_known_value() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "12");
    let store = MemorySequenceStore::with_value(30);
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));
    assert_eq!(allocator.last_issued().await, 30);

    store.set_outage(true);
    assert_eq!(allocator.last_issued().await, 12);
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn unparsable_sequence_file_reads_as_zero() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "not-a-number");
    let allocator = mock_allocator(&fs);

    assert_eq!(allocator.read_local(), 0);
    assert_eq!(allocator.next().await.unwrap(), 1);
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH).as_deref(), Some("1"));
}

#[tokio::test]
async fn surrounding_whitespace_is_ignored() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "  41\n");
    let allocator = mock_allocator(&fs);
    assert_eq!(allocator.next().await.unwrap(), 42);
}

#[tokio::test]
async fn local_write_failure_still_issues_an_id() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "5");
    fs.set_fail_writes(true);
    let allocator = mock_allocator(&fs);

    assert_eq!(allocator.next().await.unwrap(), 6);
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH).as_deref(), Some("5"));
}

#[tokio::test]
async fn shared_value_ahead_of_local_wins() {
    init_tracing();
    let fs = MockFileSystem::new();
    let store = MemorySequenceStore::with_value(50);
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));

    assert!(allocator.is_shared());
    assert_eq!(allocator.next().await.unwrap(), 51);
    assert_eq!(store.value(), Some(51));
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH).as_deref(), Some("51"));
}

#[tokio::test]
async fn shared_value_behind_local_never_reissues() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "10");
    let store = MemorySequenceStore::with_value(5);
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));

    assert_eq!(allocator.next().await.unwrap(), 11);
    assert_eq!(store.value(), Some(11));
}

#[tokio::test]
async fn missing_table_is_provisioned_and_local_value_used() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "7");
    let store = MemorySequenceStore::without_table();
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));

    assert_eq!(allocator.next().await.unwrap(), 8);
    assert!(store.table_exists());
    assert_eq!(store.ensure_calls(), 1);
    assert_eq!(store.value(), Some(8));

    // Provisioned once; later reads go straight to the store.
    assert_eq!(allocator.next().await.unwrap(), 9);
    assert_eq!(store.ensure_calls(), 1);
}

#[tokio::test]
async fn store_outage_falls_back_to_local_file() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(MOCK_SEQUENCE_PATH, "7");
    let store = MemorySequenceStore::with_value(3);
    store.set_outage(true);
    let allocator = shared_mock_allocator(&fs, Arc::new(store.clone()));

    assert_eq!(allocator.next().await.unwrap(), 8);
    assert_eq!(fs.contents(MOCK_SEQUENCE_PATH).as_deref(), Some("8"));
    assert_eq!(store.update_calls(), 1);
    assert_eq!(store.ensure_calls(), 0);

    // Once the store is back, the local value keeps it from going backwards.
    store.set_outage(false);
    assert_eq!(allocator.next().await.unwrap(), 9);
    assert_eq!(store.value(), Some(9));
}

#[tokio::test]
async fn cooperating_instances_share_one_sequence() {
    init_tracing();
    let store = MemorySequenceStore::with_value(0);
    let a = shared_mock_allocator(&MockFileSystem::new(), Arc::new(store.clone()));
    let b = shared_mock_allocator(&MockFileSystem::new(), Arc::new(store.clone()));

    assert_eq!(a.next().await.unwrap(), 1);
    assert_eq!(b.next().await.unwrap(), 2);
    assert_eq!(a.next().await.unwrap(), 3);
    assert_eq!(store.value(), Some(3));
}

#[tokio::test]
async fn table_store_reports_missing_table_then_provisions() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let store = TableSequenceStore::new(dir.path().join("shared"), "seq");

    assert_eq!(store.get_sequence().await, Err(StoreError::NotFound));

    store.ensure_sequence_table().await?;
    assert!(store.path().is_file());
    assert!(matches!(store.get_sequence().await, Err(StoreError::Corrupt(_))));

    store.update_sequence(5).await?;
    assert_eq!(store.get_sequence().await, Ok(5));
    store.update_sequence(6).await?;
    assert_eq!(store.get_sequence().await, Ok(6));

    // Provisioning an existing table leaves it alone.
    store.ensure_sequence_table().await?;
    assert_eq!(store.get_sequence().await, Ok(6));
    Ok(())
}

#[tokio::test]
async fn table_store_rejects_garbage() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let store = TableSequenceStore::new(dir.path(), "seq");
    std::fs::write(store.path(), "this is [not toml")?;

    assert!(matches!(store.get_sequence().await, Err(StoreError::Corrupt(_))));
    Ok(())
}

#[tokio::test]
async fn allocator_from_config_uses_the_table_store() -> TestResult {
    init_tracing();
    let run = tempdir()?;
    let shared = tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .run_dir(run.path())
        .shared_store(shared.path())
        .build();

    let allocator = SequenceAllocator::from_config(&cfg);
    assert!(allocator.is_shared());
    assert_eq!(allocator.path(), run.path().join("sequence").as_path());
    assert_eq!(allocator.next().await.unwrap(), 1);
    assert_eq!(allocator.next().await.unwrap(), 2);

    let table = TableSequenceStore::new(shared.path(), &cfg.sequence.table);
    assert_eq!(table.get_sequence().await, Ok(2));

    // A second instance on a different host picks up where the first left off.
    let other_run = tempdir()?;
    let other_cfg = ConfigFileBuilder::new()
        .run_dir(other_run.path())
        .shared_store(shared.path())
        .build();
    assert_eq!(SequenceAllocator::from_config(&other_cfg).next().await.unwrap(), 3);
    Ok(())
}
