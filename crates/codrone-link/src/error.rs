use std::time::Duration;

use codrone_frame::MessageKind;

/// Errors decoding a typed payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Fewer bytes than the layout needs.
    #[error("{kind} payload too short ({actual} bytes, need {expected})")]
    TooShort {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// A payload field names a message kind that does not exist.
    #[error("unknown message kind 0x{0:02X} in payload")]
    UnknownKind(u8),

    /// An enumerated field holds a value with no mapping.
    #[error("unknown {field} value 0x{value:02X}")]
    UnknownValue { field: &'static str, value: u8 },
}

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] codrone_transport::TransportError),

    /// Frame-level error (e.g. payload too large to encode).
    #[error("frame error: {0}")]
    Frame(#[from] codrone_frame::FrameError),

    /// Payload could not be interpreted.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Writing to the transport failed. Not retried here.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] codrone_frame::FrameError),

    /// No acknowledgment after every attempt.
    #[error("delivery of {kind} failed: no acknowledgment after {attempts} attempts")]
    DeliveryFailed { kind: MessageKind, attempts: u32 },

    /// The wait was cancelled, usually because the link closed.
    #[error("wait for {kind} cancelled")]
    Cancelled { kind: MessageKind },

    /// Requested data did not arrive in time.
    #[error("no {kind} received within {after:?}")]
    Timeout { kind: MessageKind, after: Duration },

    /// The link is closed.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LinkError>;
