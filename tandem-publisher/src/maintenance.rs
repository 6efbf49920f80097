//! Operations broadcast to every active server.

use tandem_core::{BroadcastFailures, Error, Result};
use tracing::{debug, warn};

use crate::{
    broker::{BrokerClient, Queue},
    publisher::Publisher,
};

impl<B: BrokerClient> Publisher<B> {
    /// Purge `queue_name` on every active server.
    ///
    /// Every server is attempted even if an earlier one fails. A server whose
    /// connection was lost has its cached connection dropped but stays in
    /// rotation.
    ///
    /// # Errors
    /// Returns [`Error::UnknownQueue`] before touching any server, or
    /// [`Error::Broadcast`] listing every server the purge failed on.
    pub fn purge(&mut self, queue_name: &str) -> Result<()> {
        let options = self.registry.queue(queue_name)?;
        let exchange_options = self.registry.exchange(&options.exchange)?;
        let mut failures = BroadcastFailures::default();

        for server in self.pool.active() {
            let result = self
                .cache
                .queue_for(server, queue_name, options, exchange_options)
                .and_then(|queue| queue.purge());
            match result {
                Ok(()) => debug!(server = %server, queue = queue_name, "Purged queue"),
                Err(err) => {
                    warn!(server = %server, queue = queue_name, error = %err, "Purge failed");
                    if err.is_connection_fault() {
                        self.cache.invalidate(server);
                    }
                    failures.push(server, err);
                },
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Broadcast { operation: "purge".to_string(), failures })
        }
    }

    /// Close every open connection.
    ///
    /// Close errors are logged and ignored. The publisher stays usable and
    /// reconnects lazily on the next publish.
    pub fn stop(&mut self) {
        debug!(active = self.pool.len(), "Stopping publisher");
        self.cache.close_all();
    }
}
