use bytes::Bytes;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload cannot be represented by the header's length field.
    #[error("payload too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The header's declared length disagrees with the bytes supplied.
    #[error("header declares {declared} payload bytes but {actual} were supplied")]
    LengthMismatch { declared: usize, actual: usize },

    /// The byte window ends before the declared frame does.
    #[error("frame truncated ({actual} bytes, need {needed})")]
    Truncated { needed: usize, actual: usize },

    /// The trailing checksum does not match header and payload.
    #[error("checksum mismatch (received 0x{received:04X}, computed 0x{computed:04X})")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// The frame is intact but its kind tag is not one we can interpret.
    /// The raw payload is kept so callers can log or forward it.
    #[error("unknown message kind 0x{tag:02X} ({} payload bytes)", payload.len())]
    UnknownMessageKind { tag: u8, payload: Bytes },

    /// The header names a device that does not exist on the bus.
    #[error("unknown device type 0x{0:02X}")]
    UnknownDevice(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended (or refused further writes).
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

impl From<codrone_transport::TransportError> for FrameError {
    fn from(err: codrone_transport::TransportError) -> Self {
        match err {
            codrone_transport::TransportError::Io(io)
            | codrone_transport::TransportError::Connect { source: io, .. } => Self::Io(io),
            codrone_transport::TransportError::Shutdown => Self::ConnectionClosed,
        }
    }
}
