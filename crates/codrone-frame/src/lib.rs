//! Wire framing for the CoDrone EDU serial protocol.
//!
//! Every frame on the wire is:
//! - 2 start markers (`0x0A 0x55`) for stream synchronization
//! - a 4-byte header: message kind, payload length, source and destination device
//! - `length` payload bytes
//! - a little-endian CRC-16/XMODEM over header and payload
//!
//! [`Synchronizer`] turns an unbounded, possibly noisy byte stream back into
//! validated frames; corrupt frames are dropped and the stream recovers on
//! the next start marker.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod crc;
pub mod error;
pub mod kind;
pub mod reader;
pub mod sync;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::DroneCodec;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, Header, CHECKSUM_SIZE, DEFAULT_FRAME_TIMEOUT,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MARKER, MAX_ENCODABLE_PAYLOAD,
};
pub use crc::{crc16, CRC16_INITIAL};
pub use error::{FrameError, Result};
pub use kind::{DeviceType, MessageKind};
pub use reader::FrameReader;
pub use sync::{Received, SyncState, SyncStats, Synchronizer};
pub use writer::FrameWriter;
