//! Core publisher implementation.
//!
//! [`Publisher::publish`] dispatches on the resolved redundancy flag:
//!
//! - failover: one delivery, rotating through the pool until a server
//!   accepts the message or every server tried has been marked dead
//! - redundancy: two deliveries to distinct servers, degrading to one copy
//!   (or to plain failover) when fewer servers are alive
//!
//! Only [`Error::ConnectionDown`] is treated as a server failure. Running out
//! of servers is reported as a zero delivery count, never as an error.

use bytes::Bytes;
use tandem_core::{
    encode, EncodeOptions, EncodedMessage, Error, MessageRegistry, PublishOptions,
    PublishOverrides, Result, Server, TandemConfig,
};
use tracing::{debug, error, info, warn};

use crate::{
    broker::{BrokerClient, Exchange},
    config::PublisherConfig,
    connection::ConnectionCache,
    pool::{PoolStatus, ServerPool},
};

/// Publishes messages across a pool of broker servers.
///
/// Owns its pool and connection cache. Every operation takes `&mut self`;
/// sharing one publisher between threads requires an outer lock.
#[derive(Debug)]
pub struct Publisher<B: BrokerClient> {
    pub(crate) pool: ServerPool,
    pub(crate) cache: ConnectionCache<B>,
    pub(crate) registry: MessageRegistry,
}

impl<B: BrokerClient> Publisher<B> {
    /// Create a publisher; no connection is opened until the first publish.
    pub fn new(client: B, registry: MessageRegistry, config: PublisherConfig) -> Self {
        let pool = match config.rng_seed {
            Some(seed) => ServerPool::with_seed(config.servers, config.recycle_timeout, seed),
            None => ServerPool::new(config.servers, config.recycle_timeout),
        };
        Self { pool, cache: ConnectionCache::new(client), registry }
    }

    /// Create a publisher from a loaded configuration.
    ///
    /// # Errors
    /// Returns an error if a server address does not parse or a declaration
    /// references an undeclared exchange.
    pub fn from_config(client: B, config: &TandemConfig) -> Result<Self> {
        let registry = MessageRegistry::from_config(config)?;
        Ok(Self::new(client, registry, PublisherConfig::from_tandem(config)?))
    }

    /// Publish `data` as `message_name` and return the number of servers that
    /// accepted it: 0 or 1 for plain messages, up to 2 for redundant ones.
    ///
    /// # Errors
    /// Returns an error for unknown message or exchange names, and for broker
    /// failures other than a lost connection.
    pub fn publish(
        &mut self,
        message_name: &str,
        data: impl Into<Bytes>,
        overrides: &PublishOverrides,
    ) -> Result<usize> {
        let options = self.registry.resolve(message_name, overrides)?;
        self.registry.exchange(&options.exchange)?;
        self.pool.recycle_dead_servers();

        if options.redundant {
            self.publish_with_redundancy(message_name, data.into(), &options)
        } else {
            self.publish_with_failover(message_name, data.into(), &options)
        }
    }

    fn publish_with_failover(
        &mut self,
        message_name: &str,
        data: Bytes,
        options: &PublishOptions,
    ) -> Result<usize> {
        let message = encode(data, EncodeOptions { redundant: false, ..options.encode_options() });
        let mut tries = self.pool.len();
        debug!(message = message_name, id = %message.id(), "Sending message");

        loop {
            let Some(server) = self.pool.select_next() else {
                error!(message = message_name, "Message could not be delivered: no server available");
                return Ok(0);
            };

            match self.try_publish(&server, &message, options) {
                Ok(()) => {
                    debug!(message = message_name, server = %server, "Message sent");
                    return Ok(1);
                },
                Err(err) if err.is_connection_fault() => {
                    self.fail_server(&server, &err);
                    tries = tries.saturating_sub(1);
                    if tries == 0 {
                        error!(message = message_name, "Message could not be delivered");
                        return Ok(0);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    fn publish_with_redundancy(
        &mut self,
        message_name: &str,
        data: Bytes,
        options: &PublishOptions,
    ) -> Result<usize> {
        if self.pool.len() < 2 {
            warn!(
                message = message_name,
                active = self.pool.len(),
                "At least two active servers are required for redundant publishing"
            );
            return self.publish_with_failover(message_name, data, options);
        }

        let message = encode(data, options.encode_options());
        let mut published: Vec<Server> = Vec::with_capacity(2);
        debug!(message = message_name, id = %message.id(), "Sending message redundantly");

        while published.len() < 2 && !self.pool.is_empty() && !self.reached_all(&published) {
            let Some(server) = self.pool.select_next() else {
                break;
            };
            if published.contains(&server) {
                continue;
            }

            match self.try_publish(&server, &message, options) {
                Ok(()) => {
                    debug!(message = message_name, server = %server, "Message sent");
                    published.push(server);
                },
                Err(err) if err.is_connection_fault() => self.fail_server(&server, &err),
                Err(err) => return Err(err),
            }
        }

        match published.len() {
            0 => error!(message = message_name, "Message could not be delivered"),
            1 => warn!(message = message_name, server = %published[0], "Failed to send message redundantly"),
            _ => {},
        }
        Ok(published.len())
    }

    fn reached_all(&self, published: &[Server]) -> bool {
        self.pool.active().iter().all(|server| published.contains(server))
    }

    /// Bind the exchange's queues on `server` if needed, then publish.
    pub(crate) fn try_publish(
        &mut self,
        server: &Server,
        message: &EncodedMessage,
        options: &PublishOptions,
    ) -> Result<()> {
        self.cache.bind_queues_for_exchange(server, &options.exchange, &self.registry)?;
        let exchange_options = self.registry.exchange(&options.exchange)?;
        debug!(server = %server, exchange = %options.exchange, "Trying to send");
        self.cache
            .exchange_for(server, &options.exchange, exchange_options)?
            .publish(message, &options.flags)
    }

    fn fail_server(&mut self, server: &Server, err: &Error) {
        info!(server = %server, error = %err, "Server down");
        self.cache.invalidate(server);
        self.pool.mark_dead(server);
    }

    /// The server pool.
    pub const fn pool(&self) -> &ServerPool {
        &self.pool
    }

    /// Snapshot of the server pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// The message registry.
    pub const fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// The broker client.
    pub const fn client(&self) -> &B {
        self.cache.client()
    }

    /// Whether a connection to `server` is currently open.
    #[must_use]
    pub fn is_connected(&self, server: &Server) -> bool {
        self.cache.is_cached(server)
    }
}
