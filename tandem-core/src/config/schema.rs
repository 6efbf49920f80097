//! Configuration schema definitions for Tandem.
//!
//! The configuration names the broker servers of the pool, how long a dead
//! server stays out of rotation, logging, and the exchanges, queues and
//! messages a publisher is allowed to use. All structures use serde for
//! (de)serialization and validator for field-level validation; cross-field
//! rules live in [`ConfigValidator`](super::ConfigValidator).

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use validator::Validate;

/// Default time a dead server stays out of rotation.
pub const DEFAULT_RECYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Root configuration object.
///
/// Layered as defaults → file → environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TandemConfig {
    /// Broker servers as `host[:port]`, in rotation order
    #[validate(length(min = 1, message = "at least one server is required"))]
    pub servers: Vec<String>,

    /// How long a server stays dead before it is tried again
    #[serde(with = "duration_ms")]
    pub recycle_timeout: Duration,

    /// Logging configuration
    #[validate(nested)]
    pub logging: LoggingConfig,

    /// Exchange declarations by name
    pub exchanges: BTreeMap<String, ExchangeDeclaration>,

    /// Queue declarations by name
    pub queues: BTreeMap<String, QueueDeclaration>,

    /// Message declarations by name
    pub messages: BTreeMap<String, MessageDeclaration>,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            servers: vec!["localhost:5672".to_string()],
            recycle_timeout: DEFAULT_RECYCLE_TIMEOUT,
            logging: LoggingConfig::default(),
            exchanges: BTreeMap::new(),
            queues: BTreeMap::new(),
            messages: BTreeMap::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[validate(length(min = 1))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Exchange routing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Routing-key pattern matching
    #[default]
    Topic,
    /// Exact routing-key matching
    Direct,
    /// Broadcast to every bound queue
    Fanout,
    /// Header matching
    Headers,
}

/// Declaration of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeDeclaration {
    /// Routing type
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    /// Survive broker restarts
    pub durable: bool,
}

impl Default for ExchangeDeclaration {
    fn default() -> Self {
        Self { kind: ExchangeKind::Topic, durable: true }
    }
}

/// Declaration of one queue. Unset fields default to the queue's own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDeclaration {
    /// Name of the queue on the broker
    pub amqp_name: Option<String>,
    /// Exchange the queue is bound to
    pub exchange: Option<String>,
    /// Binding keys
    pub keys: Vec<String>,
    /// Survive broker restarts
    pub durable: bool,
    /// Delete when the last consumer goes away
    pub auto_delete: bool,
}

impl Default for QueueDeclaration {
    fn default() -> Self {
        Self { amqp_name: None, exchange: None, keys: Vec::new(), durable: true, auto_delete: false }
    }
}

/// Declaration of one message kind. Unset fields default to the message name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDeclaration {
    /// Exchange the message is published to
    pub exchange: Option<String>,
    /// Routing key
    pub key: Option<String>,
    /// Time-to-live in seconds
    pub ttl_secs: Option<u64>,
    /// Publish to two servers
    pub redundant: bool,
    /// Ask the broker to persist the message
    pub persistent: bool,
    /// Return unroutable messages
    pub mandatory: bool,
    /// Return undeliverable messages
    pub immediate: bool,
    /// Reply-to queue name
    pub reply_to: Option<String>,
}

impl Default for MessageDeclaration {
    fn default() -> Self {
        Self {
            exchange: None,
            key: None,
            ttl_secs: None,
            redundant: false,
            persistent: true,
            mandatory: false,
            immediate: false,
            reply_to: None,
        }
    }
}

/// Serialize a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TandemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recycle_timeout, DEFAULT_RECYCLE_TIMEOUT);
    }

    #[test]
    fn test_empty_server_list_fails_validation() {
        let config = TandemConfig { servers: vec![], ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let raw = r#"
            servers = ["rabbit1:5672", "rabbit2:5672"]
            recycle_timeout = 2500

            [exchanges.orders]
            type = "direct"

            [queues.order_audit]
            exchange = "orders"
            keys = ["order.*"]

            [messages.order_created]
            exchange = "orders"
            redundant = true
            ttl_secs = 60
        "#;

        let config: TandemConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.recycle_timeout, Duration::from_millis(2500));
        assert_eq!(config.exchanges["orders"].kind, ExchangeKind::Direct);
        assert!(config.exchanges["orders"].durable);
        assert!(config.queues["order_audit"].durable);
        assert!(config.messages["order_created"].redundant);
        assert!(config.messages["order_created"].persistent);
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
