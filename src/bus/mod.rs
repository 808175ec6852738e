//! Message-bus orchestration.
//!
//! # Data Flow
//! ```text
//! [bus] consumers / producers (JSON strings)
//!     → config.rs (parse consumer and producer specifications)
//!     → orchestrator.rs:
//!         one producer per referenced canonical topic
//!         consumers built per configuration key
//!     → verify all (init, Stored offsets) → start all
//!     ... serving ...
//!     → stop all → destroy consumers one by one → destroy producers
//! ```
//!
//! # Design Decisions
//! - The wire protocol lives behind the `Consumer` / `Producer` traits
//! - No consumer starts before the whole cohort has verified
//! - Offsets are stored in the engine, next to the data they describe

pub mod config;
pub mod consumer;
pub mod error;
pub mod orchestrator;
pub mod producer;

pub use config::{
    parse_brokers, parse_consumer_configs, parse_producer_configs, ConsumerConfig,
    ConsumerConfigMap, ProducerConfig, ProducerConfigMap,
};
pub use consumer::{Consumer, ConsumerFactory, ConsumerHelper, ConsumerSpec, OffsetPolicy};
pub use error::BusError;
pub use orchestrator::{referenced_topics, MessageBus, TeardownOutcome};
pub use producer::{Producer, ProducerFactory, ProducerMap, ProducerSpec};
