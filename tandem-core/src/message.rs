//! Message envelope and encoding.
//!
//! Every published message carries a small set of transport headers next to
//! its payload: a unique id, the envelope format version, flag bits and an
//! absolute expiry time. Consumers use the id together with the
//! [`MessageFlags::REDUNDANT`] bit to deduplicate messages that were sent to
//! two brokers.

use bitflags::bitflags;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, time::Duration};
use uuid::Uuid;

use crate::{Error, Result};

/// Envelope format version written into every message.
pub const FORMAT_VERSION: u32 = 1;

/// Time-to-live applied when a message declaration does not set one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Header names used on the wire.
pub mod headers {
    /// Envelope format version
    pub const FORMAT_VERSION: &str = "format_version";
    /// Flag bits, decimal
    pub const FLAGS: &str = "flags";
    /// Expiry as unix seconds
    pub const EXPIRES_AT: &str = "expires_at";
}

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new unique message ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a message ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Envelope flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MessageFlags: u32 {
        /// The message may arrive twice, once per broker.
        const REDUNDANT = 0b0001;
    }
}

/// Options for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// How long the message stays valid after encoding
    pub ttl: Duration,
    /// Set the [`MessageFlags::REDUNDANT`] bit
    pub redundant: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL, redundant: false }
    }
}

/// Transport properties of an encoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    /// Unique message identifier
    pub message_id: MessageId,
    /// Envelope format version
    pub format_version: u32,
    /// Flag bits
    pub flags: MessageFlags,
    /// Expiry as unix seconds
    pub expires_at: i64,
}

impl MessageProperties {
    /// Render the properties as string headers (message id travels separately).
    #[must_use]
    pub fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (headers::FORMAT_VERSION.to_string(), self.format_version.to_string()),
            (headers::FLAGS.to_string(), self.flags.bits().to_string()),
            (headers::EXPIRES_AT.to_string(), self.expires_at.to_string()),
        ])
    }

    /// Rebuild properties from a message id and its string headers, as found
    /// on a message pulled back out of a broker.
    ///
    /// # Errors
    /// Returns [`Error::Serialization`] if a header is missing or malformed.
    pub fn from_headers(message_id: &str, headers: &BTreeMap<String, String>) -> Result<Self> {
        fn field<T: std::str::FromStr>(headers: &BTreeMap<String, String>, name: &str) -> Result<T>
        where
            T::Err: fmt::Display,
        {
            let raw = headers
                .get(name)
                .ok_or_else(|| Error::Serialization(format!("missing header {name}")))?;
            raw.parse::<T>()
                .map_err(|e| Error::Serialization(format!("bad header {name}={raw}: {e}")))
        }

        let uuid = Uuid::parse_str(message_id)
            .map_err(|e| Error::Serialization(format!("bad message id {message_id}: {e}")))?;

        Ok(Self {
            message_id: MessageId::from_uuid(uuid),
            format_version: field(headers, headers::FORMAT_VERSION)?,
            flags: MessageFlags::from_bits_truncate(field(headers, headers::FLAGS)?),
            expires_at: field(headers, headers::EXPIRES_AT)?,
        })
    }
}

/// Payload plus transport properties, ready to hand to a broker exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// Raw payload
    pub payload: Bytes,
    /// Transport properties
    pub properties: MessageProperties,
}

impl EncodedMessage {
    /// Whether the redundant flag is set.
    #[must_use]
    pub fn is_redundant(&self) -> bool {
        self.properties.flags.contains(MessageFlags::REDUNDANT)
    }

    /// Whether the message expired at unix time `now`.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.properties.expires_at < now
    }

    /// Message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.properties.message_id
    }
}

/// Wrap `data` in a fresh envelope.
pub fn encode(data: impl Into<Bytes>, opts: EncodeOptions) -> EncodedMessage {
    let mut flags = MessageFlags::empty();
    if opts.redundant {
        flags |= MessageFlags::REDUNDANT;
    }
    let ttl = i64::try_from(opts.ttl.as_secs()).unwrap_or(i64::MAX);

    EncodedMessage {
        payload: data.into(),
        properties: MessageProperties {
            message_id: MessageId::new(),
            format_version: FORMAT_VERSION,
            flags,
            expires_at: Utc::now().timestamp().saturating_add(ttl),
        },
    }
}
