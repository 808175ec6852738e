//! Shard-group specification parsing and partition naming.

use std::collections::BTreeMap;
use thiserror::Error;

/// Parsed shard groups keyed by group name.
///
/// A `BTreeMap` keeps iteration order stable, so partitions are always opened
/// (and logged) in the same order for the same configuration.
pub type ShardGroupMap = BTreeMap<String, ShardGroupConfig>;

/// Errors produced while parsing a shard-group specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardingError {
    /// Entry does not have the `name:start:count:increment` shape.
    #[error("malformed shard group entry '{entry}': {reason}")]
    Malformed { entry: String, reason: String },

    /// Group name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid shard group name '{0}'")]
    InvalidName(String),

    /// The same group name appears twice in one specification.
    #[error("duplicate shard group '{0}'")]
    DuplicateGroup(String),

    /// Shard count or increment is zero.
    #[error("shard group '{group}' must have {field} >= 1")]
    Zero { group: String, field: &'static str },

    /// Last shard index does not fit in u32.
    #[error("shard group '{0}' overflows the shard index space")]
    Overflow(String),
}

/// How a contiguous run of logical shards maps onto local partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardGroupConfig {
    /// First logical shard index hosted by this process.
    pub start_shard_index: u32,
    /// Number of partitions hosted locally for this group.
    pub local_virtual_shard_count: u32,
    /// Distance between consecutive hosted shard indices.
    pub shard_index_increment: u32,
}

impl ShardGroupConfig {
    /// Create a config, rejecting zero counts/increments and overflow.
    pub fn new(
        group: &str,
        start_shard_index: u32,
        local_virtual_shard_count: u32,
        shard_index_increment: u32,
    ) -> Result<Self, ShardingError> {
        if local_virtual_shard_count == 0 {
            return Err(ShardingError::Zero { group: group.to_string(), field: "count" });
        }
        if shard_index_increment == 0 {
            return Err(ShardingError::Zero { group: group.to_string(), field: "increment" });
        }
        let span = u64::from(local_virtual_shard_count - 1) * u64::from(shard_index_increment);
        if u64::from(start_shard_index) + span > u64::from(u32::MAX) {
            return Err(ShardingError::Overflow(group.to_string()));
        }
        Ok(Self {
            start_shard_index,
            local_virtual_shard_count,
            shard_index_increment,
        })
    }

    /// Logical shard index of the partition at `local_index`.
    pub fn shard_index(&self, local_index: u32) -> u32 {
        self.start_shard_index + local_index * self.shard_index_increment
    }

    /// Local partition index hosting `shard_index`, if this group hosts it.
    pub fn local_index(&self, shard_index: u32) -> Option<u32> {
        let offset = shard_index.checked_sub(self.start_shard_index)?;
        if offset % self.shard_index_increment != 0 {
            return None;
        }
        let local = offset / self.shard_index_increment;
        (local < self.local_virtual_shard_count).then_some(local)
    }
}

/// Deterministic partition name for a local index within a group.
pub fn partition_name(group: &str, index: u32) -> String {
    format!("{}-{}", group, index)
}

/// Call `visit(partition_name, shard_index)` once per partition, in ascending
/// shard-index order.
pub fn for_each_partition<F>(group: &str, config: &ShardGroupConfig, mut visit: F)
where
    F: FnMut(&str, u32),
{
    for local in 0..config.local_virtual_shard_count {
        let name = partition_name(group, local);
        visit(&name, config.shard_index(local));
    }
}

/// All partition names of a group, in shard-index order.
pub fn partition_names(group: &str, config: &ShardGroupConfig) -> Vec<String> {
    let mut names = Vec::with_capacity(config.local_virtual_shard_count as usize);
    for_each_partition(group, config, |name, _| names.push(name.to_string()));
    names
}

/// Parse `name:start:count:increment[,name:start:count:increment...]`.
///
/// An empty (or all-whitespace) specification yields an empty map.
pub fn parse_group_configs(spec: &str) -> Result<ShardGroupMap, ShardingError> {
    let mut groups = ShardGroupMap::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let fields: Vec<&str> = entry.split(':').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(ShardingError::Malformed {
                entry: entry.to_string(),
                reason: format!("expected 4 fields, found {}", fields.len()),
            });
        }

        let name = fields[0];
        if !is_valid_group_name(name) {
            return Err(ShardingError::InvalidName(name.to_string()));
        }

        let number = |field: &str, label: &str| -> Result<u32, ShardingError> {
            field.parse::<u32>().map_err(|e| ShardingError::Malformed {
                entry: entry.to_string(),
                reason: format!("{}: {}", label, e),
            })
        };
        let config = ShardGroupConfig::new(
            name,
            number(fields[1], "start")?,
            number(fields[2], "count")?,
            number(fields[3], "increment")?,
        )?;

        if groups.insert(name.to_string(), config).is_some() {
            return Err(ShardingError::DuplicateGroup(name.to_string()));
        }
    }

    Ok(groups)
}

fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parses_multiple_groups() {
        let groups = parse_group_configs("alpha:0:3:2, beta : 1:4:2").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups["alpha"],
            ShardGroupConfig {
                start_shard_index: 0,
                local_virtual_shard_count: 3,
                shard_index_increment: 2
            }
        );
        assert_eq!(groups["beta"].start_shard_index, 1);
    }

    #[test]
    fn empty_spec_has_no_groups() {
        assert!(parse_group_configs("").unwrap().is_empty());
        assert!(parse_group_configs("  , ").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            parse_group_configs("alpha:0:3"),
            Err(ShardingError::Malformed { .. })
        ));
        assert!(matches!(
            parse_group_configs("alpha:x:3:1"),
            Err(ShardingError::Malformed { .. })
        ));
        assert_eq!(
            parse_group_configs("al-pha:0:3:1"),
            Err(ShardingError::InvalidName("al-pha".into()))
        );
        assert_eq!(
            parse_group_configs("alpha:0:0:1"),
            Err(ShardingError::Zero { group: "alpha".into(), field: "count" })
        );
        assert!(matches!(
            parse_group_configs(&format!("alpha:{}:2:1", u32::MAX)),
            Err(ShardingError::Overflow(_))
        ));
    }

    #[test]
    fn rejects_duplicate_groups() {
        assert_eq!(
            parse_group_configs("alpha:0:3:2,alpha:1:3:2"),
            Err(ShardingError::DuplicateGroup("alpha".into()))
        );
    }

    #[test]
    fn partition_names_are_distinct_and_reproducible() {
        let config = ShardGroupConfig::new("alpha", 7, 16, 3).unwrap();
        let names = partition_names("alpha", &config);
        assert_eq!(names.len(), 16);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), 16);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(name, &partition_name("alpha", i as u32));
        }
        assert_eq!(names, partition_names("alpha", &config));
    }

    #[test]
    fn visitor_runs_in_shard_order() {
        let config = ShardGroupConfig::new("alpha", 0, 3, 2).unwrap();
        let mut seen = Vec::new();
        for_each_partition("alpha", &config, |name, shard| seen.push((name.to_string(), shard)));
        assert_eq!(
            seen,
            vec![
                ("alpha-0".to_string(), 0),
                ("alpha-1".to_string(), 2),
                ("alpha-2".to_string(), 4),
            ]
        );
    }

    #[test]
    fn maps_shard_index_back_to_local_partition() {
        let config = ShardGroupConfig::new("beta", 1, 4, 2).unwrap();
        assert_eq!(config.local_index(1), Some(0));
        assert_eq!(config.local_index(7), Some(3));
        assert_eq!(config.local_index(2), None);
        assert_eq!(config.local_index(9), None);
        assert_eq!(config.local_index(0), None);
    }
}
