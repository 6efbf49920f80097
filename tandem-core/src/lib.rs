//! # Tandem Core
//!
//! Shared building blocks for the Tandem high-availability publisher.
//!
//! ## Architecture
//!
//! - [`server`]: broker server identity
//! - [`message`]: message envelope and encoder
//! - [`registry`]: message, exchange and queue declarations
//! - [`config`]: configuration loading and validation
//! - [`logging`]: `tracing` subscriber bootstrap
//! - [`error`]: error types and result handling
//!
//! ## Quick Start
//!
//! ```rust
//! use tandem_core::{config::TandemConfig, MessageRegistry, PublishOverrides};
//!
//! let mut config = TandemConfig::default();
//! config.exchanges.insert("orders".into(), Default::default());
//! config.messages.insert(
//!     "order_created".into(),
//!     tandem_core::config::MessageDeclaration {
//!         exchange: Some("orders".into()),
//!         redundant: true,
//!         ..Default::default()
//!     },
//! );
//!
//! let registry = MessageRegistry::from_config(&config).unwrap();
//! let options = registry.resolve("order_created", &PublishOverrides::none()).unwrap();
//! assert!(options.redundant);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod registry;
pub mod server;

pub use crate::{
    config::TandemConfig,
    error::{BroadcastFailures, Error, Result},
    message::{encode, EncodeOptions, EncodedMessage, MessageFlags, MessageId, MessageProperties},
    registry::{
        ExchangeOptions, MessageRegistry, PublishFlags, PublishOptions, PublishOverrides,
        QueueOptions,
    },
    server::Server,
};
