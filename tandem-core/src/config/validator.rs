//! # Configuration Validation
//!
//! Field rules come from the `validator` derives on the schema; this module
//! adds the cross-field rules: every server address parses, the recycle
//! timeout is usable, and every declaration points at a declared exchange.

use crate::{config::schema::TandemConfig, server::Server, Error, Result};
use std::{collections::HashSet, time::Duration};
use tracing::{debug, warn};
use validator::Validate;

/// Configuration validator.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new configuration validator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate a configuration
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] describing the first violated rule.
    pub fn validate(config: &TandemConfig) -> Result<()> {
        Self::new().validate_config(config)
    }

    /// Perform full validation of the configuration
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] describing the first violated rule.
    pub fn validate_config(&self, config: &TandemConfig) -> Result<()> {
        debug!("Starting configuration validation");

        config.validate().map_err(Error::from)?;

        self.validate_servers(config)?;
        self.validate_recycle_timeout(config)?;
        self.validate_declarations(config)?;

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_servers(&self, config: &TandemConfig) -> Result<()> {
        let servers = Server::parse_list(&config.servers)
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let mut seen = HashSet::new();
        for server in &servers {
            if !seen.insert(server) {
                return Err(Error::Configuration(format!("Duplicate server {server}")));
            }
        }

        if servers.len() == 1 {
            warn!("Only one server configured; redundant messages will degrade to single delivery");
        }
        Ok(())
    }

    fn validate_recycle_timeout(&self, config: &TandemConfig) -> Result<()> {
        if config.recycle_timeout.is_zero() {
            return Err(Error::Configuration(
                "recycle_timeout must be greater than 0".to_string(),
            ));
        }
        if config.recycle_timeout > Duration::from_secs(3600) {
            warn!(
                "recycle_timeout of {:?} keeps failed servers out of rotation for a long time",
                config.recycle_timeout
            );
        }
        Ok(())
    }

    fn validate_declarations(&self, config: &TandemConfig) -> Result<()> {
        for (name, queue) in &config.queues {
            let exchange = queue.exchange.as_deref().unwrap_or(name);
            if !config.exchanges.contains_key(exchange) {
                return Err(Error::Configuration(format!(
                    "Queue {name} is bound to undeclared exchange {exchange}"
                )));
            }
        }

        for (name, message) in &config.messages {
            let exchange = message.exchange.as_deref().unwrap_or(name);
            if !config.exchanges.contains_key(exchange) {
                return Err(Error::Configuration(format!(
                    "Message {name} is published to undeclared exchange {exchange}"
                )));
            }
            if message.ttl_secs == Some(0) {
                return Err(Error::Configuration(format!("Message {name} has a zero ttl")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExchangeDeclaration, MessageDeclaration, QueueDeclaration};

    #[test]
    fn test_default_passes() {
        assert!(ConfigValidator::validate(&TandemConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_server_address() {
        let config = TandemConfig { servers: vec!["rabbit:abc".into()], ..Default::default() };
        assert!(matches!(ConfigValidator::validate(&config), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_server() {
        let config = TandemConfig {
            servers: vec!["rabbit:5672".into(), "rabbit".into()],
            ..Default::default()
        };
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate server rabbit:5672"));
    }

    #[test]
    fn test_zero_recycle_timeout() {
        let config = TandemConfig { recycle_timeout: Duration::ZERO, ..Default::default() };
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_undeclared_exchange_references() {
        let mut config = TandemConfig::default();
        config.queues.insert("audit".into(), QueueDeclaration::default());
        assert!(ConfigValidator::validate(&config).is_err());

        config.exchanges.insert("audit".into(), ExchangeDeclaration::default());
        assert!(ConfigValidator::validate(&config).is_ok());

        config.messages.insert(
            "created".into(),
            MessageDeclaration { exchange: Some("missing".into()), ..Default::default() },
        );
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("undeclared exchange missing"));
    }
}
