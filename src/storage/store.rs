//! Storage engine ownership: open, lookup, version metadata, close.

use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::migration::{now_ms, MigrationGate};
use crate::sharding::{for_each_partition, ShardGroupMap};
use crate::storage::paths;
use crate::storage::{PartitionGroup, PartitionGroupMap, StorageError, StorageTuning};

/// Partition for service data that does not belong to a shard group.
pub const DEFAULT_PARTITION: &str = "default";
/// Reserved partition holding the version timestamp.
pub const METADATA_PARTITION: &str = "pipeline_metadata";
/// Reserved partition holding message-bus consumer offsets.
pub const OFFSETS_PARTITION: &str = "consumer_offsets";
/// Key of the persisted data version inside the metadata partition.
pub const VERSION_TIMESTAMP_KEY: &str = "VersionTimestamp";

const SYSTEM_PARTITIONS: [&str; 3] = [DEFAULT_PARTITION, METADATA_PARTITION, OFFSETS_PARTITION];

/// Owner of the storage engine and every partition handle.
pub struct PartitionedStore {
    keyspace: Keyspace,
    path: PathBuf,
    partitions: HashMap<String, PartitionHandle>,
    groups: PartitionGroupMap,
    quota: Option<u64>,
}

impl PartitionedStore {
    /// Open the engine with every system and group partition, retire the
    /// dropped groups and advance the persisted version timestamp.
    pub fn open(
        config: &StorageConfig,
        groups: &ShardGroupMap,
        drop_groups: &ShardGroupMap,
        tuning: &StorageTuning,
    ) -> Result<Self, StorageError> {
        Self::open_with_gate(config, groups, drop_groups, tuning, &MigrationGate::default(), now_ms())
    }

    /// [`open`](Self::open) with an explicit gate and clock reading.
    pub fn open_with_gate(
        config: &StorageConfig,
        groups: &ShardGroupMap,
        drop_groups: &ShardGroupMap,
        tuning: &StorageTuning,
        gate: &MigrationGate,
        now_ms: i64,
    ) -> Result<Self, StorageError> {
        check_group_conflicts(groups, drop_groups)?;

        let db_paths = paths::parse_db_paths(&config.paths)?;
        let path = paths::resolve_primary(Path::new(&config.path), &db_paths)?;
        if !config.create_if_missing && !path.exists() {
            return Err(StorageError::MissingStore(path));
        }
        paths::prepare_dirs(&db_paths)?;
        let quota = paths::total_quota(&db_paths);

        // Every partition's options are final before the engine opens.
        let cache_mb = config.block_cache_size_mb;
        let system_plan: Vec<_> = SYSTEM_PARTITIONS
            .iter()
            .map(|name| (*name, tuning.system_options(name, cache_mb)))
            .collect();
        let mut group_plan = BTreeMap::new();
        for (group, shard_config) in groups {
            let mut planned = Vec::with_capacity(shard_config.local_virtual_shard_count as usize);
            for_each_partition(group, shard_config, |name, _| {
                planned.push((name.to_string(), tuning.group_options(group, cache_mb)));
            });
            group_plan.insert(group.as_str(), planned);
        }
        let keyspace_config = tuning.keyspace_config(&path, config.parallelism, cache_mb);

        tracing::info!(
            path = %path.display(),
            extra_paths = db_paths.len(),
            parallelism = config.parallelism,
            block_cache_size_mb = cache_mb,
            "Opening storage engine"
        );
        let keyspace = keyspace_config.open()?;

        let mut partitions = HashMap::new();
        for (name, options) in system_plan {
            let handle = keyspace.open_partition(name, options)?;
            partitions.insert(name.to_string(), handle);
        }

        let persisted = read_version(&partitions[METADATA_PARTITION])?;
        let one_off = config.create_if_missing_one_off
            && gate.can_apply(persisted, config.version_timestamp_ms, now_ms);
        let create = config.create_if_missing || one_off;
        if one_off {
            tracing::info!(
                version_timestamp_ms = config.version_timestamp_ms,
                "One-off partition creation enabled"
            );
        }

        let mut group_map = PartitionGroupMap::new();
        for (group, shard_config) in groups {
            let planned = group_plan.remove(group.as_str()).unwrap_or_default();
            let mut handles = Vec::with_capacity(planned.len());
            for (name, options) in planned {
                if !create && !keyspace.partition_exists(&name) {
                    return Err(StorageError::MissingPartition(name));
                }
                let handle = keyspace.open_partition(&name, options)?;
                partitions.insert(name, handle.clone());
                handles.push(handle);
            }
            tracing::info!(group = %group, partitions = handles.len(), "Opened partition group");
            group_map.insert(group.clone(), Arc::new(PartitionGroup::new(group, *shard_config, handles)));
        }

        for (group, shard_config) in drop_groups {
            let mut names = Vec::new();
            for_each_partition(group, shard_config, |name, _| names.push(name.to_string()));
            for name in names {
                if keyspace.partition_exists(&name) {
                    let handle = keyspace.open_partition(&name, Default::default())?;
                    keyspace.delete_partition(handle)?;
                    tracing::info!(partition = %name, "Dropped retired partition");
                } else {
                    tracing::debug!(partition = %name, "Retired partition already absent");
                }
            }
        }

        let store = Self {
            keyspace,
            path,
            partitions,
            groups: group_map,
            quota,
        };

        let target = config.version_timestamp_ms;
        if target > 0 && persisted.map_or(true, |current| target > current) {
            store.persist_version_timestamp(target)?;
        }
        store.check_quota();

        tracing::info!(partitions = store.partitions.len(), "Storage engine ready");
        Ok(store)
    }

    /// Handle of a partition opened at startup.
    pub fn partition(&self, name: &str) -> Result<PartitionHandle, StorageError> {
        self.partitions
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownPartition(name.to_string()))
    }

    /// Every opened partition by name.
    pub fn partitions(&self) -> &HashMap<String, PartitionHandle> {
        &self.partitions
    }

    /// Opened shard groups.
    pub fn groups(&self) -> &PartitionGroupMap {
        &self.groups
    }

    /// Engine handle, for cross-partition batches.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Primary data directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted data version, if any.
    pub fn read_version_timestamp(&self) -> Result<Option<i64>, StorageError> {
        read_version(&self.partitions[METADATA_PARTITION])
    }

    /// Write the data version unconditionally and sync it to disk.
    pub fn persist_version_timestamp(&self, version_timestamp_ms: i64) -> Result<(), StorageError> {
        self.partitions[METADATA_PARTITION]
            .insert(VERSION_TIMESTAMP_KEY, version_timestamp_ms.to_be_bytes().to_vec())?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        metrics::gauge!("pipeline_version_timestamp_ms").set(version_timestamp_ms as f64);
        tracing::info!(version_timestamp_ms, "Persisted version timestamp");
        Ok(())
    }

    fn check_quota(&self) {
        let Some(quota) = self.quota else { return };
        let used = self.keyspace.disk_space();
        if used > quota {
            tracing::warn!(used_bytes = used, quota_bytes = quota, "Storage exceeds configured path quotas");
        } else {
            tracing::debug!(used_bytes = used, quota_bytes = quota, "Storage usage within quotas");
        }
    }

    /// Release every handle, sync the journal and close the engine.
    ///
    /// Must run after every component holding partition handles is destroyed.
    pub fn close(self) -> Result<(), StorageError> {
        let Self {
            keyspace,
            partitions,
            groups,
            ..
        } = self;
        drop(groups);
        drop(partitions);
        let persisted = keyspace.persist(PersistMode::SyncAll);
        drop(keyspace);
        persisted?;
        tracing::info!("Storage engine has shut down gracefully");
        Ok(())
    }
}

fn read_version(metadata: &PartitionHandle) -> Result<Option<i64>, StorageError> {
    match metadata.get(VERSION_TIMESTAMP_KEY)? {
        Some(bytes) => {
            let raw: [u8; 8] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| StorageError::CorruptVersion(bytes.len()))?;
            Ok(Some(i64::from_be_bytes(raw)))
        }
        None => Ok(None),
    }
}

fn check_group_conflicts(groups: &ShardGroupMap, drop_groups: &ShardGroupMap) -> Result<(), StorageError> {
    for name in groups.keys().chain(drop_groups.keys()) {
        if SYSTEM_PARTITIONS.contains(&name.as_str()) {
            return Err(StorageError::GroupConflict(name.clone()));
        }
    }
    if let Some(name) = groups.keys().find(|name| drop_groups.contains_key(*name)) {
        return Err(StorageError::GroupConflict(name.clone()));
    }
    Ok(())
}

impl std::fmt::Debug for PartitionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedStore")
            .field("path", &self.path)
            .field("partitions", &self.partitions.len())
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .finish()
    }
}
