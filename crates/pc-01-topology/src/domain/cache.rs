//! # Topology Cache
//!
//! Logical topic name to broker-assigned identifier. Entries are written
//! after a successful resolve and never evicted; broker identifiers are
//! stable for the lifetime of a topic.

use dashmap::DashMap;

/// Per-provisioner topic id cache.
#[derive(Debug, Default)]
pub struct TopologyCache {
    topics: DashMap<String, String>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_topic_id(&self, topic_name: &str) -> Option<String> {
        self.topics.get(topic_name).map(|id| id.value().clone())
    }

    /// Last writer wins.
    pub fn put_topic_id(&self, topic_name: impl Into<String>, topic_id: impl Into<String>) {
        self.topics.insert(topic_name.into(), topic_id.into());
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
