//! Publisher configuration types.

use std::time::Duration;

use tandem_core::{config::DEFAULT_RECYCLE_TIMEOUT, Result, Server, TandemConfig};

/// Configuration for the publisher client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Broker servers in rotation order
    pub servers: Vec<Server>,

    /// How long a failed server stays out of rotation
    pub recycle_timeout: Duration,

    /// Seed for the server picked after a failure; `None` seeds from entropy
    pub rng_seed: Option<u64>,
}

impl PublisherConfig {
    /// Publisher settings for `servers` with default timeouts.
    #[must_use]
    pub fn new(servers: Vec<Server>) -> Self {
        Self { servers, ..Self::default() }
    }

    /// Extract the publisher settings from a loaded configuration.
    ///
    /// # Errors
    /// Returns [`tandem_core::Error::InvalidServer`] for an unparseable address.
    pub fn from_tandem(config: &TandemConfig) -> Result<Self> {
        Ok(Self {
            servers: Server::parse_list(&config.servers)?,
            recycle_timeout: config.recycle_timeout,
            rng_seed: None,
        })
    }

    /// Set the recycle timeout.
    #[must_use]
    pub const fn with_recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = timeout;
        self
    }

    /// Seed the failover RNG for reproducible runs.
    #[must_use]
    pub const fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            servers: vec![Server::new("localhost", tandem_core::server::DEFAULT_PORT)],
            recycle_timeout: DEFAULT_RECYCLE_TIMEOUT,
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tandem() {
        let config = TandemConfig {
            servers: vec!["a:1".into(), "b".into()],
            recycle_timeout: Duration::from_secs(3),
            ..Default::default()
        };
        let publisher = PublisherConfig::from_tandem(&config).unwrap();
        assert_eq!(publisher.servers, vec![Server::new("a", 1), Server::new("b", 5672)]);
        assert_eq!(publisher.recycle_timeout, Duration::from_secs(3));
        assert_eq!(publisher.rng_seed, None);
    }

    #[test]
    fn test_from_tandem_rejects_bad_address() {
        let config = TandemConfig { servers: vec!["a:b".into()], ..Default::default() };
        assert!(PublisherConfig::from_tandem(&config).is_err());
    }

    #[test]
    fn test_builders() {
        let config = PublisherConfig::new(vec![Server::new("a", 1)])
            .with_recycle_timeout(Duration::from_millis(10))
            .with_rng_seed(3);
        assert_eq!(config.recycle_timeout, Duration::from_millis(10));
        assert_eq!(config.rng_seed, Some(3));
    }
}
