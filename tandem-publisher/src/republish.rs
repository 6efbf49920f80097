//! Directed redelivery to a named server.

use tandem_core::{EncodedMessage, PublishOverrides, Result, Server};
use tracing::debug;

use crate::{broker::BrokerClient, publisher::Publisher};

impl<B: BrokerClient> Publisher<B> {
    /// Publish an already encoded message to `server`, bypassing rotation.
    ///
    /// Used to put a message recovered from elsewhere back onto the broker it
    /// came from. The message is sent unchanged. There is no retry: a lost
    /// connection drops the cached connection for `server` and is returned
    /// as is. `server` is not marked dead.
    ///
    /// # Errors
    /// Returns `ConnectionDown` if `server` cannot be reached, and any
    /// configuration or broker error.
    pub fn republish(
        &mut self,
        server: &Server,
        message_name: &str,
        message: &EncodedMessage,
        overrides: &PublishOverrides,
    ) -> Result<()> {
        let options = self.registry.resolve(message_name, overrides)?;
        self.pool.recycle_dead_servers();
        if !self.pool.set_current(server) {
            debug!(server = %server, "Republishing to a server outside the rotation");
        }

        debug!(server = %server, message = message_name, id = %message.id(), "Republishing");
        let result = self.try_publish(server, message, &options);
        if let Err(err) = &result {
            if err.is_connection_fault() {
                self.cache.invalidate(server);
            }
        }
        result
    }
}
