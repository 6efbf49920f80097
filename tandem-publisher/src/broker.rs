//! Broker client abstraction.
//!
//! The publisher never speaks a wire protocol itself. It drives an
//! implementation of these traits, which are blocking calls: any waiting
//! happens inside the implementation, and so do connect and I/O timeouts.
//!
//! Implementations must report a lost or refused connection as
//! [`Error::ConnectionDown`](tandem_core::Error::ConnectionDown); that is the
//! only error the publisher fails over on. Everything else is propagated.

use tandem_core::{EncodedMessage, ExchangeOptions, PublishFlags, QueueOptions, Result, Server};

/// Factory for broker connections.
pub trait BrokerClient {
    /// Connection type produced by this client
    type Connection: Connection;

    /// Open and start a connection to `server`.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the broker cannot be reached.
    fn connect(&self, server: &Server) -> Result<Self::Connection>;
}

/// An open connection to one broker.
pub trait Connection {
    /// Exchange handle type
    type Exchange: Exchange;
    /// Queue handle type
    type Queue: Queue;

    /// Declare (or look up) an exchange.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the connection is lost, or a broker error if
    /// the declaration is refused.
    fn declare_exchange(&mut self, name: &str, options: &ExchangeOptions) -> Result<Self::Exchange>;

    /// Declare (or look up) the queue described by `options`.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the connection is lost, or a broker error if
    /// the declaration is refused.
    fn declare_queue(&mut self, options: &QueueOptions) -> Result<Self::Queue>;

    /// Close the connection.
    ///
    /// # Errors
    /// Returns an error if the close handshake fails.
    fn close(&mut self) -> Result<()>;
}

/// A declared exchange.
pub trait Exchange {
    /// Publish one message.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the connection is lost.
    fn publish(&mut self, message: &EncodedMessage, flags: &PublishFlags) -> Result<()>;
}

/// A declared queue.
pub trait Queue {
    /// Bind the queue to `exchange` with `binding_key`.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the connection is lost.
    fn bind(&mut self, exchange: &str, binding_key: &str) -> Result<()>;

    /// Drop every message currently in the queue.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if the connection is lost.
    fn purge(&mut self) -> Result<()>;
}
