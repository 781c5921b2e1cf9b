use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::{crc16, CRC16_INITIAL};
use crate::error::{FrameError, Result};
use crate::kind::{DeviceType, MessageKind};

/// Start markers preceding every frame.
pub const MARKER: [u8; 2] = [0x0A, 0x55];

/// Header: kind (1) + length (1) + from (1) + to (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Trailing CRC-16, little-endian.
pub const CHECKSUM_SIZE: usize = 2;

/// Largest payload the one-byte length field can describe.
pub const MAX_ENCODABLE_PAYLOAD: usize = u8::MAX as usize;

/// Default largest payload the receiver will buffer before giving up on a frame.
pub const DEFAULT_MAX_PAYLOAD: usize = 128;

/// Default age after which a half-received frame is abandoned.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(600);

/// Fixed-layout frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// What the payload is.
    pub kind: MessageKind,
    /// Payload length in bytes.
    pub length: u8,
    /// Sending device.
    pub from: DeviceType,
    /// Receiving device.
    pub to: DeviceType,
}

impl Header {
    /// Build a header for a payload of `payload_len` bytes.
    pub fn new(
        kind: MessageKind,
        payload_len: usize,
        from: DeviceType,
        to: DeviceType,
    ) -> Result<Self> {
        let length = u8::try_from(payload_len).map_err(|_| FrameError::FrameTooLarge {
            size: payload_len,
            max: MAX_ENCODABLE_PAYLOAD,
        })?;
        Ok(Self {
            kind,
            length,
            from,
            to,
        })
    }

    /// Wire representation.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [
            self.kind.as_u8(),
            self.length,
            self.from.as_u8(),
            self.to.as_u8(),
        ]
    }

    /// Declared payload length.
    pub fn payload_len(&self) -> usize {
        usize::from(self.length)
    }
}

/// A validated frame: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, deriving the header length from the payload.
    pub fn new(
        kind: MessageKind,
        from: DeviceType,
        to: DeviceType,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        let header = Header::new(kind, payload.len(), from, to)?;
        Ok(Self { header, payload })
    }

    /// Shorthand for `self.header.kind`.
    pub fn kind(&self) -> MessageKind {
        self.header.kind
    }

    /// The total wire size of this frame (markers + header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        MARKER.len() + HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }
}

/// Checksum over header and payload as one stream.
pub fn checksum(header: &[u8], payload: &[u8]) -> u16 {
    crc16(payload, crc16(header, CRC16_INITIAL))
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────┬────────┬──────┬──────┬──────────────┬───────────┐
/// │ Markers  │ Kind │ Length │ From │ To   │ Payload      │ CRC-16    │
/// │ 0x0A 0x55│ (1B) │ (1B)   │ (1B) │ (1B) │ (Length B)   │ (2B LE)   │
/// └──────────┴──────┴────────┴──────┴──────┴──────────────┴───────────┘
/// ```
pub fn encode_frame(header: &Header, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_ENCODABLE_PAYLOAD {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
            max: MAX_ENCODABLE_PAYLOAD,
        });
    }
    if header.payload_len() != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_len(),
            actual: payload.len(),
        });
    }

    let header_bytes = header.to_bytes();
    dst.reserve(MARKER.len() + HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    dst.put_slice(&MARKER);
    dst.put_slice(&header_bytes);
    dst.put_slice(payload);
    dst.put_u16_le(checksum(&header_bytes, payload));
    Ok(())
}

/// Decode one frame from a window that starts right after the start markers.
///
/// The window must hold exactly header, payload and checksum. Integrity is
/// checked before interpretation, so an intact frame of an unknown kind is
/// reported as [`FrameError::UnknownMessageKind`] with its payload.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE + CHECKSUM_SIZE,
            actual: src.len(),
        });
    }

    let declared = usize::from(src[1]);
    let total = HEADER_SIZE + declared + CHECKSUM_SIZE;
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            actual: src.len(),
        });
    }
    if src.len() > total {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: src.len() - HEADER_SIZE - CHECKSUM_SIZE,
        });
    }

    let (header_bytes, rest) = src.split_at(HEADER_SIZE);
    let (payload, trailer) = rest.split_at(declared);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = checksum(header_bytes, payload);
    if received != computed {
        return Err(FrameError::ChecksumMismatch { received, computed });
    }

    let Some(kind) = MessageKind::from_u8(header_bytes[0]) else {
        return Err(FrameError::UnknownMessageKind {
            tag: header_bytes[0],
            payload: Bytes::copy_from_slice(payload),
        });
    };
    let from = DeviceType::from_u8(header_bytes[2])
        .ok_or(FrameError::UnknownDevice(header_bytes[2]))?;
    let to = DeviceType::from_u8(header_bytes[3])
        .ok_or(FrameError::UnknownDevice(header_bytes[3]))?;

    Ok(Frame {
        header: Header {
            kind,
            length: src[1],
            from,
            to,
        },
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Configuration for framing on a link.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload the receiver accepts. Default: 128 bytes.
    pub max_payload_size: usize,
    /// Abandon a partial frame older than this. Default: 600 ms.
    pub frame_timeout: Option<Duration>,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
            read_timeout: None,
            write_timeout: None,
        }
    }
}
