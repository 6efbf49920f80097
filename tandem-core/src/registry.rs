//! Message, exchange and queue declarations used at publish time.
//!
//! The registry answers three questions for the publisher: which exchange
//! and transport flags a message name maps to, how an exchange is declared,
//! and which queues have to be bound to an exchange before the first publish
//! on a server. Unknown names are programmer errors and surface as
//! [`Error::UnknownMessage`], [`Error::UnknownExchange`] or
//! [`Error::UnknownQueue`].

use std::{collections::HashMap, time::Duration};

use crate::{
    config::{ExchangeDeclaration, ExchangeKind, MessageDeclaration, QueueDeclaration, TandemConfig},
    message::{EncodeOptions, DEFAULT_TTL},
    Error, Result,
};

/// How an exchange is declared on a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Routing type
    pub kind: ExchangeKind,
    /// Survive broker restarts
    pub durable: bool,
}

impl From<&ExchangeDeclaration> for ExchangeOptions {
    fn from(decl: &ExchangeDeclaration) -> Self {
        Self { kind: decl.kind, durable: decl.durable }
    }
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self::from(&ExchangeDeclaration::default())
    }
}

/// How a queue is declared and bound on a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    /// Name of the queue on the broker
    pub amqp_name: String,
    /// Exchange the queue is bound to
    pub exchange: String,
    /// Binding keys, never empty
    pub binding_keys: Vec<String>,
    /// Survive broker restarts
    pub durable: bool,
    /// Delete when the last consumer goes away
    pub auto_delete: bool,
}

impl QueueOptions {
    fn from_declaration(name: &str, decl: &QueueDeclaration) -> Self {
        let binding_keys =
            if decl.keys.is_empty() { vec![name.to_string()] } else { decl.keys.clone() };
        Self {
            amqp_name: decl.amqp_name.clone().unwrap_or_else(|| name.to_string()),
            exchange: decl.exchange.clone().unwrap_or_else(|| name.to_string()),
            binding_keys,
            durable: decl.durable,
            auto_delete: decl.auto_delete,
        }
    }
}

/// Transport-level flags passed through to the broker on publish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishFlags {
    /// Routing key
    pub routing_key: String,
    /// Persist the message on the broker
    pub persistent: bool,
    /// Return unroutable messages
    pub mandatory: bool,
    /// Return undeliverable messages
    pub immediate: bool,
    /// Reply-to queue name
    pub reply_to: Option<String>,
}

/// Registered options of one message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOptions {
    /// Exchange the message is published to
    pub exchange: String,
    /// Time-to-live
    pub ttl: Duration,
    /// Publish to two servers
    pub redundant: bool,
    /// Transport flags
    pub flags: PublishFlags,
}

impl MessageOptions {
    fn from_declaration(name: &str, decl: &MessageDeclaration) -> Self {
        Self {
            exchange: decl.exchange.clone().unwrap_or_else(|| name.to_string()),
            ttl: decl.ttl_secs.map_or(DEFAULT_TTL, Duration::from_secs),
            redundant: decl.redundant,
            flags: PublishFlags {
                routing_key: decl.key.clone().unwrap_or_else(|| name.to_string()),
                persistent: decl.persistent,
                mandatory: decl.mandatory,
                immediate: decl.immediate,
                reply_to: decl.reply_to.clone(),
            },
        }
    }
}

/// Per-call overrides of a message's registered options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishOverrides {
    /// Override the time-to-live
    pub ttl: Option<Duration>,
    /// Override the redundancy flag
    pub redundant: Option<bool>,
    /// Override the routing key
    pub routing_key: Option<String>,
    /// Override persistence
    pub persistent: Option<bool>,
    /// Override the reply-to queue
    pub reply_to: Option<String>,
}

impl PublishOverrides {
    /// No overrides.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the time-to-live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the redundancy flag.
    #[must_use]
    pub const fn with_redundant(mut self, redundant: bool) -> Self {
        self.redundant = Some(redundant);
        self
    }

    /// Set the routing key.
    #[must_use]
    pub fn with_routing_key(mut self, key: impl Into<String>) -> Self {
        self.routing_key = Some(key.into());
        self
    }

    /// Set persistence.
    #[must_use]
    pub const fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Set the reply-to queue.
    #[must_use]
    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }
}

/// Fully resolved options for one publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Exchange to publish to
    pub exchange: String,
    /// Time-to-live
    pub ttl: Duration,
    /// Publish to two servers
    pub redundant: bool,
    /// Transport flags
    pub flags: PublishFlags,
}

impl PublishOptions {
    /// Encoder options for this call.
    #[must_use]
    pub const fn encode_options(&self) -> EncodeOptions {
        EncodeOptions { ttl: self.ttl, redundant: self.redundant }
    }
}

/// Lookup tables for messages, exchanges and queues.
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    exchanges: HashMap<String, ExchangeOptions>,
    queues: HashMap<String, QueueOptions>,
    messages: HashMap<String, MessageOptions>,
    exchange_queues: HashMap<String, Vec<String>>,
}

impl MessageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the declaration tables of `config`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownExchange`] if a queue or message references an
    /// exchange that is not declared.
    pub fn from_config(config: &TandemConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (name, decl) in &config.exchanges {
            registry.register_exchange(name, decl);
        }
        for (name, decl) in &config.queues {
            registry.register_queue(name, decl)?;
        }
        for (name, decl) in &config.messages {
            registry.register_message(name, decl)?;
        }
        Ok(registry)
    }

    /// Declare an exchange. Re-registering replaces the options.
    pub fn register_exchange(&mut self, name: impl Into<String>, decl: &ExchangeDeclaration) {
        let name = name.into();
        self.exchange_queues.entry(name.clone()).or_default();
        self.exchanges.insert(name, decl.into());
    }

    /// Declare a queue and bind it to its exchange.
    ///
    /// # Errors
    /// Returns [`Error::UnknownExchange`] if the exchange is not declared.
    pub fn register_queue(&mut self, name: impl Into<String>, decl: &QueueDeclaration) -> Result<()> {
        let name = name.into();
        let options = QueueOptions::from_declaration(&name, decl);
        let bound = self
            .exchange_queues
            .get_mut(&options.exchange)
            .ok_or_else(|| Error::UnknownExchange(options.exchange.clone()))?;
        if !bound.contains(&name) {
            bound.push(name.clone());
        }
        self.queues.insert(name, options);
        Ok(())
    }

    /// Declare a message kind.
    ///
    /// # Errors
    /// Returns [`Error::UnknownExchange`] if the exchange is not declared.
    pub fn register_message(
        &mut self,
        name: impl Into<String>,
        decl: &MessageDeclaration,
    ) -> Result<()> {
        let name = name.into();
        let options = MessageOptions::from_declaration(&name, decl);
        if !self.exchanges.contains_key(&options.exchange) {
            return Err(Error::UnknownExchange(options.exchange));
        }
        self.messages.insert(name, options);
        Ok(())
    }

    /// Registered options of a message.
    ///
    /// # Errors
    /// Returns [`Error::UnknownMessage`] for an unregistered name.
    pub fn message(&self, name: &str) -> Result<&MessageOptions> {
        self.messages.get(name).ok_or_else(|| Error::UnknownMessage(name.to_string()))
    }

    /// Declaration options of an exchange.
    ///
    /// # Errors
    /// Returns [`Error::UnknownExchange`] for an unregistered name.
    pub fn exchange(&self, name: &str) -> Result<&ExchangeOptions> {
        self.exchanges.get(name).ok_or_else(|| Error::UnknownExchange(name.to_string()))
    }

    /// Declaration options of a queue.
    ///
    /// # Errors
    /// Returns [`Error::UnknownQueue`] for an unregistered name.
    pub fn queue(&self, name: &str) -> Result<&QueueOptions> {
        self.queues.get(name).ok_or_else(|| Error::UnknownQueue(name.to_string()))
    }

    /// Names of the queues bound to `exchange`, in registration order.
    ///
    /// # Errors
    /// Returns [`Error::UnknownExchange`] for an unregistered name.
    pub fn queues_for_exchange(&self, exchange: &str) -> Result<&[String]> {
        self.exchange_queues
            .get(exchange)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownExchange(exchange.to_string()))
    }

    /// Merge the registered options of `message_name` with `overrides`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownMessage`] for an unregistered name.
    pub fn resolve(&self, message_name: &str, overrides: &PublishOverrides) -> Result<PublishOptions> {
        let registered = self.message(message_name)?;
        let mut flags = registered.flags.clone();
        if let Some(key) = &overrides.routing_key {
            flags.routing_key.clone_from(key);
        }
        if let Some(persistent) = overrides.persistent {
            flags.persistent = persistent;
        }
        if overrides.reply_to.is_some() {
            flags.reply_to.clone_from(&overrides.reply_to);
        }

        Ok(PublishOptions {
            exchange: registered.exchange.clone(),
            ttl: overrides.ttl.unwrap_or(registered.ttl),
            redundant: overrides.redundant.unwrap_or(registered.redundant),
            flags,
        })
    }

    /// Number of registered messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
