//! # In-memory broker for tests
//!
//! [`MockBroker`] implements [`BrokerClient`] without any network. Servers can
//! be taken down and brought back while a publisher holds connections to
//! them; every operation is recorded as a [`BrokerEvent`] so tests can assert
//! on exactly what reached which server.
//!
//! ```rust
//! use tandem_core::Server;
//! use tandem_publisher::{testing::MockBroker, BrokerClient};
//!
//! let broker = MockBroker::new();
//! let server = Server::new("rabbit1", 5672);
//! broker.take_down(&server);
//! assert!(broker.connect(&server).is_err());
//! ```

use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use tandem_core::{
    EncodedMessage, Error, ExchangeOptions, PublishFlags, QueueOptions, Result, Server,
};

use crate::broker::{BrokerClient, Connection, Exchange, Queue};

/// One recorded broker interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A connection was opened
    Connected(Server),
    /// A connection attempt was refused
    ConnectRefused(Server),
    /// An exchange was declared
    ExchangeDeclared {
        /// Target server
        server: Server,
        /// Exchange name
        name: String,
    },
    /// A queue was declared
    QueueDeclared {
        /// Target server
        server: Server,
        /// Queue name on the broker
        name: String,
    },
    /// A queue was bound
    Bound {
        /// Target server
        server: Server,
        /// Queue name on the broker
        queue: String,
        /// Exchange name
        exchange: String,
        /// Binding key
        key: String,
    },
    /// A message was accepted
    Published(Delivery),
    /// A publish failed
    PublishFailed(Server),
    /// A queue was purged
    Purged {
        /// Target server
        server: Server,
        /// Queue name on the broker
        queue: String,
    },
    /// A connection was closed
    Closed(Server),
}

/// A message accepted by a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Accepting server
    pub server: Server,
    /// Exchange the message was published to
    pub exchange: String,
    /// Transport flags used
    pub flags: PublishFlags,
    /// The message itself
    pub message: EncodedMessage,
}

#[derive(Debug, Default)]
struct MockState {
    down: HashSet<Server>,
    failing_close: HashSet<Server>,
    failing_purge: HashSet<Server>,
    rejecting: HashSet<Server>,
    events: Vec<BrokerEvent>,
}

impl MockState {
    fn check_up(&self, server: &Server) -> Result<()> {
        if self.down.contains(server) {
            Err(Error::connection_down(server, "connection refused"))
        } else {
            Ok(())
        }
    }
}

/// Scriptable in-memory broker shared between a publisher and a test.
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

impl MockBroker {
    /// Every server up, nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation against `server` fail with `ConnectionDown`,
    /// including on connections opened earlier.
    pub fn take_down(&self, server: &Server) {
        self.state.lock().down.insert(server.clone());
    }

    /// Undo [`MockBroker::take_down`].
    pub fn bring_up(&self, server: &Server) {
        self.state.lock().down.remove(server);
    }

    /// Make closing connections to `server` fail.
    pub fn fail_close(&self, server: &Server) {
        self.state.lock().failing_close.insert(server.clone());
    }

    /// Make purges on `server` fail with a broker error.
    pub fn fail_purge(&self, server: &Server) {
        self.state.lock().failing_purge.insert(server.clone());
    }

    /// Make publishes on `server` fail with a broker error that is not a
    /// connection fault.
    pub fn reject_publishes(&self, server: &Server) {
        self.state.lock().rejecting.insert(server.clone());
    }

    /// Every recorded event, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<BrokerEvent> {
        self.state.lock().events.clone()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Every accepted message, oldest first.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::Published(delivery) => Some(delivery.clone()),
                _ => None,
            })
            .collect()
    }

    /// Servers that accepted a message, oldest first.
    #[must_use]
    pub fn delivered_to(&self) -> Vec<Server> {
        self.deliveries().into_iter().map(|d| d.server).collect()
    }

    /// Number of publish attempts (accepted or failed) on any server.
    #[must_use]
    pub fn publish_attempts(&self) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Published(_) | BrokerEvent::PublishFailed(_)))
    }

    /// Number of connect attempts (successful or refused) on `server`.
    #[must_use]
    pub fn connect_attempts(&self, server: &Server) -> usize {
        self.count(|e| {
            matches!(e, BrokerEvent::Connected(s) | BrokerEvent::ConnectRefused(s) if s == server)
        })
    }

    /// Number of connect attempts on any server.
    #[must_use]
    pub fn total_connect_attempts(&self) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Connected(_) | BrokerEvent::ConnectRefused(_)))
    }

    /// Number of queue bindings made on `server`.
    #[must_use]
    pub fn bind_count(&self, server: &Server) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Bound { server: s, .. } if s == server))
    }

    /// Number of connections closed on `server`.
    #[must_use]
    pub fn close_count(&self, server: &Server) -> usize {
        self.count(|e| matches!(e, BrokerEvent::Closed(s) if s == server))
    }

    /// Queues declared on `server`, in order.
    #[must_use]
    pub fn queues_declared(&self, server: &Server) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::QueueDeclared { server: s, name } if s == server => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Servers on which `queue` was purged, in order.
    #[must_use]
    pub fn purged_on(&self, queue: &str) -> Vec<Server> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::Purged { server, queue: q } if q == queue => Some(server.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&BrokerEvent) -> bool) -> usize {
        self.state.lock().events.iter().filter(|e| predicate(e)).count()
    }
}

impl BrokerClient for MockBroker {
    type Connection = MockConnection;

    fn connect(&self, server: &Server) -> Result<MockConnection> {
        let mut state = self.state.lock();
        if let Err(err) = state.check_up(server) {
            state.events.push(BrokerEvent::ConnectRefused(server.clone()));
            return Err(err);
        }
        state.events.push(BrokerEvent::Connected(server.clone()));
        Ok(MockConnection { server: server.clone(), state: Arc::clone(&self.state) })
    }
}

/// Connection handed out by [`MockBroker`].
#[derive(Debug)]
pub struct MockConnection {
    server: Server,
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    type Exchange = MockExchange;
    type Queue = MockQueue;

    fn declare_exchange(&mut self, name: &str, _options: &ExchangeOptions) -> Result<MockExchange> {
        let mut state = self.state.lock();
        state.check_up(&self.server)?;
        state.events.push(BrokerEvent::ExchangeDeclared {
            server: self.server.clone(),
            name: name.to_string(),
        });
        Ok(MockExchange {
            server: self.server.clone(),
            name: name.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn declare_queue(&mut self, options: &QueueOptions) -> Result<MockQueue> {
        let mut state = self.state.lock();
        state.check_up(&self.server)?;
        state.events.push(BrokerEvent::QueueDeclared {
            server: self.server.clone(),
            name: options.amqp_name.clone(),
        });
        Ok(MockQueue {
            server: self.server.clone(),
            name: options.amqp_name.clone(),
            state: Arc::clone(&self.state),
        })
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.events.push(BrokerEvent::Closed(self.server.clone()));
        if state.failing_close.contains(&self.server) {
            return Err(Error::Broker(format!("close handshake with {} failed", self.server)));
        }
        state.check_up(&self.server)
    }
}

/// Exchange handle handed out by [`MockConnection`].
#[derive(Debug)]
pub struct MockExchange {
    server: Server,
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl Exchange for MockExchange {
    fn publish(&mut self, message: &EncodedMessage, flags: &PublishFlags) -> Result<()> {
        let mut state = self.state.lock();
        if let Err(err) = state.check_up(&self.server) {
            state.events.push(BrokerEvent::PublishFailed(self.server.clone()));
            return Err(err);
        }
        if state.rejecting.contains(&self.server) {
            state.events.push(BrokerEvent::PublishFailed(self.server.clone()));
            return Err(Error::Broker(format!("{} rejected the message", self.server)));
        }
        state.events.push(BrokerEvent::Published(Delivery {
            server: self.server.clone(),
            exchange: self.name.clone(),
            flags: flags.clone(),
            message: message.clone(),
        }));
        Ok(())
    }
}

/// Queue handle handed out by [`MockConnection`].
#[derive(Debug)]
pub struct MockQueue {
    server: Server,
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl Queue for MockQueue {
    fn bind(&mut self, exchange: &str, binding_key: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check_up(&self.server)?;
        state.events.push(BrokerEvent::Bound {
            server: self.server.clone(),
            queue: self.name.clone(),
            exchange: exchange.to_string(),
            key: binding_key.to_string(),
        });
        Ok(())
    }

    fn purge(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.check_up(&self.server)?;
        if state.failing_purge.contains(&self.server) {
            return Err(Error::Broker(format!("purge of {} refused", self.name)));
        }
        state.events.push(BrokerEvent::Purged { server: self.server.clone(), queue: self.name.clone() });
        Ok(())
    }
}
