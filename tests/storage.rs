//! Storage open / migration gate scenarios against a real engine.

use kv_pipeline::config::StorageConfig;
use kv_pipeline::migration::MigrationGate;
use kv_pipeline::sharding::{parse_group_configs, partition_names, ShardGroupMap};
use kv_pipeline::storage::{PartitionedStore, StorageError, StorageTuning, DEFAULT_PARTITION};

const MINUTE_MS: i64 = 60 * 1000;

fn storage_config(dir: &std::path::Path) -> StorageConfig {
    StorageConfig {
        path: dir.join("db").to_string_lossy().into_owned(),
        block_cache_size_mb: 8,
        ..StorageConfig::default()
    }
}

fn open(config: &StorageConfig, groups: &str, drop_groups: &str) -> Result<PartitionedStore, StorageError> {
    let groups = parse_group_configs(groups).unwrap();
    let drop_groups = parse_group_configs(drop_groups).unwrap();
    PartitionedStore::open(config, &groups, &drop_groups, &StorageTuning::default())
}

#[test]
fn alpha_group_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let groups = parse_group_configs("alpha:0:3:2").unwrap();
    assert_eq!(
        partition_names("alpha", &groups["alpha"]),
        vec!["alpha-0", "alpha-1", "alpha-2"]
    );

    let config = storage_config(dir.path());
    let store = PartitionedStore::open(&config, &groups, &ShardGroupMap::new(), &StorageTuning::default())
        .unwrap();
    for name in ["alpha-0", "alpha-1", "alpha-2", DEFAULT_PARTITION] {
        assert!(store.partition(name).is_ok(), "{name} should be open");
    }
    assert_eq!(store.read_version_timestamp().unwrap(), None);

    store.persist_version_timestamp(1000).unwrap();
    let persisted = store.read_version_timestamp().unwrap();
    assert_eq!(persisted, Some(1000));

    let gate = MigrationGate::default();
    assert!(!gate.can_apply(persisted, 1000, 1000 + MINUTE_MS));
    assert!(gate.can_apply(persisted, 2000, 2000 + 10 * MINUTE_MS));
    assert!(!gate.can_apply(persisted, 2000, 2000 + 40 * MINUTE_MS));

    // Shard 2 is the second local partition of a group advancing by 2.
    let alpha = &store.groups()["alpha"];
    alpha.partition_for_shard(2).unwrap().insert("k", "v").unwrap();
    assert!(store.partition("alpha-1").unwrap().get("k").unwrap().is_some());
    assert!(alpha.partition_for_shard(3).is_none());

    store.close().unwrap();
}

#[test]
fn version_timestamp_only_moves_forward() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = storage_config(dir.path());

    config.version_timestamp_ms = 5000;
    let store = open(&config, "", "").unwrap();
    assert_eq!(store.read_version_timestamp().unwrap(), Some(5000));
    store.close().unwrap();

    config.version_timestamp_ms = 3000;
    let store = open(&config, "", "").unwrap();
    assert_eq!(store.read_version_timestamp().unwrap(), Some(5000));
    store.close().unwrap();

    config.version_timestamp_ms = 7000;
    let store = open(&config, "", "").unwrap();
    assert_eq!(store.read_version_timestamp().unwrap(), Some(7000));
    store.close().unwrap();
}

#[test]
fn missing_store_is_fatal_without_create() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        create_if_missing: false,
        ..storage_config(dir.path())
    };
    assert!(matches!(open(&config, "", ""), Err(StorageError::MissingStore(_))));
}

#[test]
fn one_off_creation_follows_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = storage_config(dir.path());
    config.version_timestamp_ms = 1000;
    open(&config, "", "").unwrap().close().unwrap();

    let groups = parse_group_configs("beta:0:2:1").unwrap();
    let none = ShardGroupMap::new();
    let gate = MigrationGate::default();
    config.create_if_missing = false;

    // Without the one-off flag new partitions are refused.
    let err = PartitionedStore::open_with_gate(&config, &groups, &none, &StorageTuning::default(), &gate, 2000)
        .err()
        .expect("creation must be refused");
    assert!(matches!(err, StorageError::MissingPartition(ref name) if name == "beta-0"));

    // Fresh target inside the window: created once, and the target persisted.
    config.create_if_missing_one_off = true;
    config.version_timestamp_ms = 2000;
    let now = 2000 + MINUTE_MS;
    let store = PartitionedStore::open_with_gate(&config, &groups, &none, &StorageTuning::default(), &gate, now)
        .unwrap();
    assert!(store.partition("beta-1").is_ok());
    assert_eq!(store.read_version_timestamp().unwrap(), Some(2000));
    store.close().unwrap();

    // Same target again: already applied, so a further new group is refused.
    let gamma = parse_group_configs("beta:0:2:1,gamma:0:1:1").unwrap();
    let err = PartitionedStore::open_with_gate(&config, &gamma, &none, &StorageTuning::default(), &gate, now)
        .err()
        .expect("already applied");
    assert!(matches!(err, StorageError::MissingPartition(ref name) if name == "gamma-0"));
}

#[test]
fn dropped_groups_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let config = storage_config(dir.path());

    let store = open(&config, "alpha:0:2:1,keep:0:1:1", "").unwrap();
    store.partition("alpha-0").unwrap().insert("k", "v").unwrap();
    store.close().unwrap();

    let store = open(&config, "keep:0:1:1", "alpha:0:2:1").unwrap();
    assert!(!store.keyspace().partition_exists("alpha-0"));
    assert!(!store.keyspace().partition_exists("alpha-1"));
    assert!(store.keyspace().partition_exists("keep-0"));
    store.close().unwrap();
}

#[test]
fn conflicting_groups_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = storage_config(dir.path());
    assert!(matches!(
        open(&config, "alpha:0:1:1", "alpha:0:1:1"),
        Err(StorageError::GroupConflict(_))
    ));
    assert!(matches!(
        open(&config, "default:0:1:1", ""),
        Err(StorageError::GroupConflict(_))
    ));
}

#[test]
fn multi_path_entry_becomes_primary() {
    let dir = tempfile::tempdir().unwrap();
    let primary = dir.path().join("p0");
    let config = StorageConfig {
        path: String::new(),
        paths: format!(
            r#"[{{"path": "{}", "target_size": 1073741824}}, {{"path": "{}", "target_size": 1073741824}}]"#,
            primary.display(),
            dir.path().join("p1").display()
        ),
        block_cache_size_mb: 8,
        ..StorageConfig::default()
    };
    let store = open(&config, "", "").unwrap();
    assert_eq!(store.path(), primary.as_path());
    assert!(dir.path().join("p1").is_dir());
    store.close().unwrap();
}
