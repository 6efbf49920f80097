//! Connection management for publishers.
//!
//! One [`ResourceBundle`] per server holds the open connection and every
//! exchange and queue handle declared through it. Bundles are created on
//! first use and dropped as a whole when the server dies, so a reconnect
//! after recycling never sees stale handles.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use tandem_core::{Error, ExchangeOptions, MessageRegistry, QueueOptions, Result, Server};
use tracing::{debug, warn};

use crate::broker::{BrokerClient, Connection, Queue};

/// Connection plus declared handles for one server.
struct ResourceBundle<C: Connection> {
    connection: C,
    exchanges: HashMap<String, C::Exchange>,
    queues: HashMap<String, C::Queue>,
    bound_exchanges: HashSet<String>,
}

impl<C: Connection> ResourceBundle<C> {
    fn new(connection: C) -> Self {
        Self {
            connection,
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bound_exchanges: HashSet::new(),
        }
    }

    fn exchange(&mut self, name: &str, options: &ExchangeOptions) -> Result<&mut C::Exchange> {
        declare_exchange(&mut self.connection, &mut self.exchanges, name, options)
    }

    fn queue(
        &mut self,
        name: &str,
        options: &QueueOptions,
        exchange_options: &ExchangeOptions,
    ) -> Result<&mut C::Queue> {
        let Self { connection, exchanges, queues, .. } = self;
        match queues.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                declare_exchange(connection, exchanges, &options.exchange, exchange_options)?;
                let mut queue = connection.declare_queue(options)?;
                for key in &options.binding_keys {
                    queue.bind(&options.exchange, key)?;
                }
                debug!(queue = %options.amqp_name, exchange = %options.exchange, "Bound queue");
                Ok(entry.insert(queue))
            },
        }
    }
}

fn declare_exchange<'a, C: Connection>(
    connection: &mut C,
    exchanges: &'a mut HashMap<String, C::Exchange>,
    name: &str,
    options: &ExchangeOptions,
) -> Result<&'a mut C::Exchange> {
    match exchanges.entry(name.to_string()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let exchange = connection.declare_exchange(name, options)?;
            debug!(exchange = %name, "Declared exchange");
            Ok(entry.insert(exchange))
        },
    }
}

/// Lazily populated per-server resource cache.
///
/// Not synchronized; owned by exactly one publisher.
pub struct ConnectionCache<B: BrokerClient> {
    client: B,
    bundles: HashMap<Server, ResourceBundle<B::Connection>>,
}

impl<B: BrokerClient> ConnectionCache<B> {
    /// Create an empty cache over `client`.
    pub fn new(client: B) -> Self {
        Self { client, bundles: HashMap::new() }
    }

    /// The underlying broker client.
    pub const fn client(&self) -> &B {
        &self.client
    }

    fn bundle(&mut self, server: &Server) -> Result<&mut ResourceBundle<B::Connection>> {
        match self.bundles.entry(server.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!(server = %server, "Connecting");
                let connection = self.client.connect(server)?;
                Ok(entry.insert(ResourceBundle::new(connection)))
            },
        }
    }

    /// Cached connection to `server`, connecting on first use.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the broker cannot be reached.
    pub fn connection_for(&mut self, server: &Server) -> Result<&mut B::Connection> {
        Ok(&mut self.bundle(server)?.connection)
    }

    /// Cached exchange handle, declaring it on first use.
    ///
    /// # Errors
    /// Propagates connect and declare failures.
    pub fn exchange_for(
        &mut self,
        server: &Server,
        name: &str,
        options: &ExchangeOptions,
    ) -> Result<&mut <B::Connection as Connection>::Exchange> {
        self.bundle(server)?.exchange(name, options)
    }

    /// Cached queue handle, declaring and binding it on first use.
    ///
    /// # Errors
    /// Propagates connect, declare and bind failures.
    pub fn queue_for(
        &mut self,
        server: &Server,
        name: &str,
        options: &QueueOptions,
        exchange_options: &ExchangeOptions,
    ) -> Result<&mut <B::Connection as Connection>::Queue> {
        self.bundle(server)?.queue(name, options, exchange_options)
    }

    /// Declare `exchange` and bind every queue `registry` lists for it.
    ///
    /// Runs once per (server, exchange); later calls return immediately.
    ///
    /// # Errors
    /// Unknown names are reported before any network call. Connect, declare
    /// and bind failures are propagated.
    pub fn bind_queues_for_exchange(
        &mut self,
        server: &Server,
        exchange: &str,
        registry: &MessageRegistry,
    ) -> Result<()> {
        let exchange_options = registry.exchange(exchange)?;
        let queue_names = registry.queues_for_exchange(exchange)?;

        let bundle = self.bundle(server)?;
        if bundle.bound_exchanges.contains(exchange) {
            return Ok(());
        }

        bundle.exchange(exchange, exchange_options)?;
        for queue_name in queue_names {
            let options = registry.queue(queue_name)?;
            let own_exchange = registry.exchange(&options.exchange)?;
            bundle.queue(queue_name, options, own_exchange)?;
        }
        bundle.bound_exchanges.insert(exchange.to_string());
        Ok(())
    }

    /// Close and forget everything cached for `server`.
    ///
    /// Close failures are logged and swallowed. Returns whether anything was
    /// cached.
    pub fn invalidate(&mut self, server: &Server) -> bool {
        let Some(mut bundle) = self.bundles.remove(server) else {
            return false;
        };

        bundle.queues.clear();
        bundle.exchanges.clear();
        if let Err(err) = bundle.connection.close() {
            let err = Error::ResourceCleanup { server: server.to_string(), reason: err.to_string() };
            warn!(server = %server, error = %err, "Ignoring error while closing connection");
        } else {
            debug!(server = %server, "Closed connection");
        }
        true
    }

    /// Invalidate every cached server.
    pub fn close_all(&mut self) {
        let servers: Vec<Server> = self.bundles.keys().cloned().collect();
        for server in &servers {
            self.invalidate(server);
        }
    }

    /// Whether a connection to `server` is cached.
    #[must_use]
    pub fn is_cached(&self, server: &Server) -> bool {
        self.bundles.contains_key(server)
    }

    /// Servers with a cached connection.
    pub fn cached_servers(&self) -> impl Iterator<Item = &Server> {
        self.bundles.keys()
    }
}

impl<B: BrokerClient> std::fmt::Debug for ConnectionCache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache").field("servers", &self.bundles.len()).finish()
    }
}
