//! Error types for wrpc-wire.

use thiserror::Error;

use crate::index::Index;

/// Main error type for all protocol operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error during socket or stream operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Leading version byte of a framed stream is not supported.
    #[error("unsupported protocol version {0:#04x}")]
    UnsupportedVersion(u8),

    /// A base-encoded record could not be decoded.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Transport reached EOF before a complete record was available.
    #[error("unexpected EOF: {0}")]
    UnexpectedEof(&'static str),

    /// Frame data exceeds the configured limit.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: u64, max: u32 },

    /// Data arrived for an index with no declared structural position.
    #[error("no channel declared for index {0}")]
    UnknownIndex(Index),

    /// Index nesting exceeds `MAX_INDEX_DEPTH`.
    #[error("index depth {depth} exceeds maximum {max}")]
    IndexTooDeep { depth: usize, max: usize },

    /// Value does not match the declared type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The same index channel was opened twice within one invocation.
    #[error("channel {0} already opened")]
    DuplicateChannel(Index),

    /// A stream chunk arrived after the end-of-stream terminator.
    #[error("chunk received on {0} after end of stream")]
    ChunkAfterEnd(Index),

    /// A channel was closed before a legitimate end for its type (trap).
    #[error("channel {0} closed abnormally")]
    AbnormalClose(Index),

    /// Gave up waiting on a channel.
    #[error("timed out waiting on channel {0}")]
    Timeout(Index),

    /// The callee never acknowledged the invocation.
    #[error("acknowledgment not received for `{0}`")]
    AckTimeout(String),

    /// The acknowledgment carried no reply subject.
    #[error("acknowledgment is missing a reply subject")]
    MissingReplySubject,

    /// Nobody is subscribed on the subject.
    #[error("no responders on `{0}`")]
    NoResponders(String),

    /// Lifecycle state machine rejected an event.
    #[error("illegal transition from {state} on {event}")]
    IllegalTransition {
        state: &'static str,
        event: &'static str,
    },

    /// No handler registered for the function.
    #[error("no handler for `{instance}.{name}`")]
    HandlerNotFound { instance: String, name: String },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// The transport failed while an invocation was in flight.
    #[error("transport failed: {0}")]
    Transport(String),

    /// Target identifier could not be parsed.
    #[error("invalid target `{0}`")]
    InvalidTarget(String),
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
