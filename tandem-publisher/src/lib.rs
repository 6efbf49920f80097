//! # Tandem Publisher
//!
//! Publish-side high availability over a pool of independent broker servers.
//!
//! This crate provides:
//! - Failover publishing: one copy, rotating through servers until one accepts it
//! - Redundant publishing: one copy on each of two distinct servers
//! - Dead-server tracking with lazy recycling after a cooldown
//! - A per-server cache of connections, exchanges and queues
//! - Directed republishing and broadcast maintenance (purge, stop)
//!
//! The wire protocol is supplied by an implementation of [`BrokerClient`].
//! [`testing::MockBroker`] is an in-memory implementation for tests.
//!
//! ## Examples
//!
//! ```rust
//! use tandem_core::{config::{ExchangeDeclaration, MessageDeclaration}, MessageRegistry, PublishOverrides, Server};
//! use tandem_publisher::{testing::MockBroker, Publisher, PublisherConfig};
//!
//! let mut registry = MessageRegistry::new();
//! registry.register_exchange("orders", &ExchangeDeclaration::default());
//! registry
//!     .register_message("order_created", &MessageDeclaration {
//!         exchange: Some("orders".into()),
//!         redundant: true,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! let broker = MockBroker::new();
//! let config = PublisherConfig::new(vec![Server::new("rabbit1", 5672), Server::new("rabbit2", 5672)]);
//! let mut publisher = Publisher::new(broker.clone(), registry, config);
//!
//! let delivered = publisher.publish("order_created", "{}", &PublishOverrides::none()).unwrap();
//! assert_eq!(delivered, 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod broker;
pub mod config;
pub mod connection;
mod maintenance;
pub mod pool;
pub mod publisher;
mod republish;
pub mod testing;

pub use broker::{BrokerClient, Connection, Exchange, Queue};
pub use config::PublisherConfig;
pub use connection::ConnectionCache;
pub use pool::{PoolStatus, ServerPool};
pub use publisher::Publisher;
pub use tandem_core::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{BrokerClient, Publisher, PublisherConfig};
    pub use tandem_core::{EncodedMessage, Error, MessageRegistry, PublishOverrides, Result, Server};
}
