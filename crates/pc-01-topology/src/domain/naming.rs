//! # Name Qualifier
//!
//! Broker names are global, so every logical name is qualified with the
//! environment and, for queues, the owning service:
//!
//! ```text
//! topic:  {environment}_{topic}
//! queue:  {environment}_{topic}_{service}_{queue}
//! DLQ:    {environment}_{service}_DLQ
//! ```
//!
//! A queue fed by several topics uses [`MULTI_TOPIC_SENTINEL`] in place of
//! the topic name.

use std::sync::OnceLock;

use crate::config::TopologyConfig;
use crate::domain::entities::NameKind;
use crate::domain::errors::TopologyError;

/// Topic segment of a queue subscribed to more than one topic.
pub const MULTI_TOPIC_SENTINEL: &str = "multipleTopics";

/// Service identifier used when none is configured.
pub const UNKNOWN_SERVICE: &str = "unknownService";

/// Environment identifier used when neither an override nor a host is set.
pub const DEFAULT_ENVIRONMENT: &str = "local";

pub const MAX_ENVIRONMENT_ID_LEN: usize = 12;
pub const MAX_SERVICE_ID_LEN: usize = 24;

/// Check a logical name against its kind's length and charset.
pub fn validate_name(kind: NameKind, name: &str) -> Result<(), TopologyError> {
    let max = kind.max_len();
    let valid = !name.is_empty()
        && name.len() <= max
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TopologyError::InvalidName {
            kind,
            name: name.to_string(),
            max,
        })
    }
}

/// Derives qualified broker names. Identifiers are resolved on first use
/// and cached for the qualifier's lifetime.
#[derive(Debug, Default)]
pub struct NameQualifier {
    environment_override: Option<String>,
    environment_host: Option<String>,
    service_name: Option<String>,
    environment_id: OnceLock<String>,
    service_id: OnceLock<String>,
}

impl NameQualifier {
    pub fn new(
        environment_override: Option<String>,
        environment_host: Option<String>,
        service_name: Option<String>,
    ) -> Self {
        Self {
            environment_override,
            environment_host,
            service_name,
            environment_id: OnceLock::new(),
            service_id: OnceLock::new(),
        }
    }

    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(
            config.environment_name.clone(),
            config.environment_host.clone(),
            config.service_name.clone(),
        )
    }

    /// The override if set, else the host's first dot segment capped at 12
    /// characters.
    pub fn environment_id(&self) -> &str {
        self.environment_id.get_or_init(|| {
            if let Some(name) = &self.environment_override {
                return name.clone();
            }
            self.environment_host
                .as_deref()
                .and_then(|host| host.split('.').next())
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.chars().take(MAX_ENVIRONMENT_ID_LEN).collect())
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
        })
    }

    /// The configured service capped at 24 characters, or [`UNKNOWN_SERVICE`].
    pub fn service_id(&self) -> &str {
        self.service_id.get_or_init(|| match &self.service_name {
            Some(name) if !name.is_empty() => name.chars().take(MAX_SERVICE_ID_LEN).collect(),
            _ => UNKNOWN_SERVICE.to_string(),
        })
    }

    pub fn qualify_topic(&self, topic_name: &str) -> Result<String, TopologyError> {
        validate_name(NameKind::Topic, topic_name)?;
        Ok(format!("{}_{}", self.environment_id(), topic_name))
    }

    pub fn qualify_queue(&self, topic_name: &str, queue_name: &str) -> Result<String, TopologyError> {
        let topic = self.qualify_topic(topic_name)?;
        validate_name(NameKind::Queue, queue_name)?;
        Ok(format!("{}_{}_{}", topic, self.service_id(), queue_name))
    }

    pub fn dead_letter_queue_name(&self) -> String {
        format!("{}_{}_DLQ", self.environment_id(), self.service_id())
    }

    /// Glob matching every qualified topic of this environment.
    pub fn environment_topic_pattern(&self) -> String {
        format!("{}_*", self.environment_id())
    }
}
