//! Shard-group resolution.
//!
//! # Data Flow
//! ```text
//! "alpha:0:3:2,beta:1:4:2"
//!     → group.rs (parse, validate, reject duplicates)
//!     → ShardGroupMap (group name → ShardGroupConfig)
//!     → for_each_partition (partition name + shard index, ascending)
//!     → storage opens one partition per name
//! ```
//!
//! # Design Decisions
//! - Parsing runs once at process start; any malformed entry is fatal
//! - Partition names depend only on (group, local index), so the same
//!   configuration always yields the same partitions across restarts

pub mod group;

pub use group::{
    for_each_partition, parse_group_configs, partition_name, partition_names, ShardGroupConfig,
    ShardGroupMap, ShardingError,
};
