//! Error types for the Tandem core library.

use std::fmt;
use thiserror::Error;

/// Main error type for Tandem operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The broker behind `server` is unreachable or dropped the connection.
    #[error("Connection to {server} down: {reason}")]
    ConnectionDown {
        /// Server the fault was observed on
        server: String,
        /// Transport-level description
        reason: String,
    },

    /// Closing a dead server's resources failed
    #[error("Resource cleanup failed for {server}: {reason}")]
    ResourceCleanup {
        /// Server whose resources were being released
        server: String,
        /// Transport-level description
        reason: String,
    },

    /// Any other broker-side failure (declaration refused, channel error, ...)
    #[error("Broker error: {0}")]
    Broker(String),

    /// No message declaration for this name
    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    /// No exchange declaration for this name
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// No queue declaration for this name
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// Server address could not be parsed
    #[error("Invalid server address: {0}")]
    InvalidServer(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An operation broadcast to every active server failed on some of them
    #[error("{operation} failed on {failures}")]
    Broadcast {
        /// Name of the broadcast operation
        operation: String,
        /// Per-server failures, in pool order
        failures: BroadcastFailures,
    },
}

/// Failures collected while applying one operation to every active server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastFailures(pub Vec<(String, Error)>);

impl BroadcastFailures {
    /// Record the failure of `server`.
    pub fn push(&mut self, server: impl ToString, err: Error) {
        self.0.push((server.to_string(), err));
    }

    /// Number of servers that failed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every server succeeded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(server, error)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Error)> {
        self.0.iter()
    }
}

impl fmt::Display for BroadcastFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} server(s): ", self.0.len())?;
        for (i, (server, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{server} ({err})")?;
        }
        Ok(())
    }
}

/// Result type alias for Tandem operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::ConnectionDown`] for `server`.
    pub fn connection_down(server: impl ToString, reason: impl Into<String>) -> Self {
        Self::ConnectionDown { server: server.to_string(), reason: reason.into() }
    }

    /// Whether this error means the server should be taken out of rotation.
    #[must_use]
    pub const fn is_connection_fault(&self) -> bool {
        matches!(self, Self::ConnectionDown { .. })
    }

    /// Whether this error is a programmer error in the message declarations.
    #[must_use]
    pub const fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessage(_)
                | Self::UnknownExchange(_)
                | Self::UnknownQueue(_)
                | Self::Configuration(_)
        )
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::Configuration(err.to_string())
    }
}
