//! Consumer and producer specification parsing.
//!
//! Consumers: `{"<key>": {..} | [{..}, ..]}`. Producers: `{"<canonical>": {"topic": "..", ..}}`.
//! Unrecognised fields are kept in `settings` for the concrete client.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::bus::BusError;

/// Consumer configurations keyed by configuration key.
pub type ConsumerConfigMap = BTreeMap<String, Vec<ConsumerConfig>>;
/// Producer configurations keyed by canonical topic name.
pub type ProducerConfigMap = BTreeMap<String, ProducerConfig>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsumerConfig {
    pub topic: String,
    pub group_id: String,
    /// Bus partitions to read; empty means every partition.
    #[serde(default)]
    pub partitions: Vec<i32>,
    /// Shard group whose partitions this consumer writes to.
    #[serde(default)]
    pub shard_group: Option<String>,
    /// Canonical topics this consumer produces to.
    #[serde(default)]
    pub producer_topics: Vec<String>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProducerConfig {
    /// Physical topic name; defaults to the canonical name.
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ProducerConfig {
    pub fn physical_topic<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.topic.as_deref().unwrap_or(canonical)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ConsumerConfig),
    Many(Vec<ConsumerConfig>),
}

pub fn parse_consumer_configs(spec: &str) -> Result<ConsumerConfigMap, BusError> {
    if spec.trim().is_empty() {
        return Ok(ConsumerConfigMap::new());
    }
    let raw: BTreeMap<String, OneOrMany> =
        serde_json::from_str(spec).map_err(BusError::ConsumerConfig)?;
    Ok(raw
        .into_iter()
        .map(|(key, entry)| {
            let configs = match entry {
                OneOrMany::One(config) => vec![config],
                OneOrMany::Many(configs) => configs,
            };
            (key, configs)
        })
        .collect())
}

pub fn parse_producer_configs(spec: &str) -> Result<ProducerConfigMap, BusError> {
    if spec.trim().is_empty() {
        return Ok(ProducerConfigMap::new());
    }
    serde_json::from_str(spec).map_err(BusError::ProducerConfig)
}

/// Split a comma-separated broker list, dropping empty entries.
pub fn parse_brokers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect()
}
