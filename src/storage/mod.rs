//! Partitioned storage lifecycle.
//!
//! # Data Flow
//! ```text
//! StorageConfig + ShardGroupMap (open / drop)
//!     → tuning.rs (plan every partition's options, then the engine config)
//!     → store.rs open:
//!         open engine → system partitions → read VersionTimestamp
//!         → migration gate → group partitions → retire dropped groups
//!         → persist VersionTimestamp
//!     → PartitionedStore (owned by the bootstrap until close)
//! ```
//!
//! # Design Decisions
//! - No degraded open: every failure is returned and treated as fatal
//! - The partition map is immutable after open; lookups need no locking
//! - `close` consumes the store so it can only run once, and the bootstrap
//!   runs it after every component holding partitions has been destroyed

pub mod error;
pub mod group;
pub mod manager;
pub mod paths;
pub mod store;
pub mod tuning;

pub use error::StorageError;
pub use group::{PartitionGroup, PartitionGroupMap};
pub use manager::{StorageManager, StorageManagerFactory};
pub use paths::{parse_db_paths, DbPath};
pub use store::{
    PartitionedStore, DEFAULT_PARTITION, METADATA_PARTITION, OFFSETS_PARTITION,
    VERSION_TIMESTAMP_KEY,
};
pub use tuning::{KeyspaceTuner, PartitionTuner, StorageTuning};

pub use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
