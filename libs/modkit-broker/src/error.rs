//! Stable error identities for broker construction and operation.

use modkit_errors::ErrorKind;

pub static ERR_UNSUPPORTED_QUEUE_DRIVER: ErrorKind =
    ErrorKind::new("BROKER_001", "unsupported queue driver {{.driver}}");
pub static ERR_QUEUE_BROKER_CONFIG_NOT_FOUND: ErrorKind =
    ErrorKind::new("BROKER_002", "no broker configuration found at {{.key}}");
pub static ERR_REDIS_CONFIG_NOT_FOUND: ErrorKind =
    ErrorKind::new("BROKER_003", "no redis configuration found at {{.key}}");
pub static ERR_REDIS_CLIENT_NOT_CONFIGURED: ErrorKind =
    ErrorKind::new("BROKER_004", "redis client is not configured for broker {{.topic}}");
pub static ERR_PRODUCE_FAILED: ErrorKind = ErrorKind::new("BROKER_005", "failed to produce to topic {{.topic}}");
pub static ERR_CONSUME_FAILED: ErrorKind = ErrorKind::new("BROKER_006", "failed to consume from topic {{.topic}}");
pub static ERR_ACK_FAILED: ErrorKind = ErrorKind::new("BROKER_007", "failed to ack message {{.id}} on topic {{.topic}}");
