//! A pluggable message broker: one [`Broker`] contract, backed by an
//! in-memory implementation for tests and single-process deployments, or
//! Redis Streams consumer groups for everything else.
//!
//! [`build_broker`] reads a `{"driver": "memory" | "redis", "redis": {...}}`
//! configuration section and constructs the matching backend.

mod broker;
mod error;
mod memory;
#[cfg(feature = "redis-streams")]
mod redis;
mod subscribe;

use std::sync::Arc;

use modkit::Config;
use modkit_errors::ErrorValue;

pub use broker::{Broker, Message, MessageId};
pub use error::{
    ERR_ACK_FAILED, ERR_CONSUME_FAILED, ERR_PRODUCE_FAILED, ERR_QUEUE_BROKER_CONFIG_NOT_FOUND,
    ERR_REDIS_CLIENT_NOT_CONFIGURED, ERR_REDIS_CONFIG_NOT_FOUND, ERR_UNSUPPORTED_QUEUE_DRIVER,
};
pub use memory::MemoryBroker;
#[cfg(feature = "redis-streams")]
pub use redis::{RedisBroker, RedisBrokerConfig};
pub use subscribe::subscribe;

/// Builds a [`Broker`] from the `"broker"` section of `config`.
///
/// Recognised drivers: `"memory"` (default when no section is present)
/// and, when this crate is built with the `redis-streams` feature,
/// `"redis"`.
///
/// # Errors
///
/// Returns [`ERR_QUEUE_BROKER_CONFIG_NOT_FOUND`] if `key` names a section
/// that is missing entirely, [`ERR_UNSUPPORTED_QUEUE_DRIVER`] if the
/// configured driver isn't recognised, [`ERR_REDIS_CONFIG_NOT_FOUND`] if
/// the `"redis"` driver is selected without a `redis` sub-section, or
/// [`ERR_REDIS_CLIENT_NOT_CONFIGURED`] if the `"redis"` driver is
/// selected in a build without the `redis-streams` feature enabled.
pub async fn build_broker(config: &dyn Config, key: &str) -> Result<Arc<dyn Broker>, ErrorValue> {
    if !config.has(key) {
        return Err(ERR_QUEUE_BROKER_CONFIG_NOT_FOUND.value().with_detail("key", key));
    }
    let driver = config
        .get_sub(key)
        .and_then(|section| section.get_string("driver"))
        .unwrap_or_else(|| "memory".to_owned());

    match driver.as_str() {
        "memory" => Ok(Arc::new(MemoryBroker::default())),
        "redis" => build_redis_broker(config, key).await,
        other => Err(ERR_UNSUPPORTED_QUEUE_DRIVER.value().with_detail("driver", other)),
    }
}

#[cfg(feature = "redis-streams")]
async fn build_redis_broker(config: &dyn Config, key: &str) -> Result<Arc<dyn Broker>, ErrorValue> {
    let redis_key = format!("{key}.redis");
    if !config.has(&redis_key) {
        return Err(ERR_REDIS_CONFIG_NOT_FOUND.value().with_detail("key", redis_key));
    }
    let redis_config: RedisBrokerConfig = config.deserialize_required(&redis_key)?;
    let broker = RedisBroker::connect(redis_config)
        .await
        .map_err(|e| ERR_REDIS_CLIENT_NOT_CONFIGURED.value().with_detail("topic", "<connect>").with_cause(e))?;
    Ok(Arc::new(broker))
}

#[cfg(not(feature = "redis-streams"))]
async fn build_redis_broker(_config: &dyn Config, _key: &str) -> Result<Arc<dyn Broker>, ErrorValue> {
    Err(ERR_REDIS_CLIENT_NOT_CONFIGURED.value().with_detail("topic", "<unconfigured>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn defaults_to_the_memory_driver() {
        let config = modkit::StaticConfig::from_sections(HashMap::from([(
            "broker".to_owned(),
            serde_json::json!({"driver": "memory"}),
        )]));
        let broker = build_broker(&config, "broker").await.unwrap();
        let id = broker.produce("t", b"hi").await.unwrap();
        assert!(!id.to_string().is_empty());
    }

    #[tokio::test]
    async fn missing_section_errors() {
        let config = modkit::StaticConfig::default();
        let err = build_broker(&config, "broker").await.unwrap_err();
        assert!(err.is(&ERR_QUEUE_BROKER_CONFIG_NOT_FOUND));
    }

    #[tokio::test]
    async fn unknown_driver_errors() {
        let config = modkit::StaticConfig::from_sections(HashMap::from([(
            "broker".to_owned(),
            serde_json::json!({"driver": "kafka"}),
        )]));
        let err = build_broker(&config, "broker").await.unwrap_err();
        assert!(err.is(&ERR_UNSUPPORTED_QUEUE_DRIVER));
    }
}
