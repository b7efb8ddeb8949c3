//! Runtime configuration.
//!
//! All limits and timeouts used by the framed and NATS bindings live in one
//! [`Config`], loadable from JSON. Durations are written in milliseconds:
//!
//! ```
//! use std::time::Duration;
//! use wrpc_wire::config::Config;
//!
//! let config = Config::from_json(r#"{
//!     "ack_timeout_ms": 250,
//!     "nats": { "prefix": "lattice", "max_payload": 4096 }
//! }"#).unwrap();
//!
//! assert_eq!(config.ack_timeout, Duration::from_millis(250));
//! assert_eq!(config.nats.prefix.as_deref(), Some("lattice"));
//! assert_eq!(config.max_concurrent_invocations, 256);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::writer::WriterConfig;

/// Default time to wait for a NATS acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a reader waits on a quiet channel before giving up.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound on invocations a server handles at once.
pub const DEFAULT_MAX_CONCURRENT_INVOCATIONS: usize = 256;

/// Default NATS max payload (the server default of 1 MB).
pub const DEFAULT_NATS_MAX_PAYLOAD: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest frame data accepted from a peer.
    pub max_frame_size: u32,
    #[serde(with = "duration_ms", rename = "ack_timeout_ms")]
    pub ack_timeout: Duration,
    #[serde(with = "duration_ms", rename = "channel_timeout_ms")]
    pub channel_timeout: Duration,
    pub max_concurrent_invocations: usize,
    pub nats: NatsConfig,
    pub writer: WriterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
            max_concurrent_invocations: DEFAULT_MAX_CONCURRENT_INVOCATIONS,
            nats: NatsConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl Config {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Optional subject prefix placed before `wrpc.0.0.1`.
    pub prefix: Option<String>,
    /// Largest message payload; longer parameters are split.
    pub max_payload: usize,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            max_payload: DEFAULT_NATS_MAX_PAYLOAD,
        }
    }
}

/// Serde adapter writing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
