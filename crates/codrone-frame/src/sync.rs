//! Byte-stream synchronizer.
//!
//! Serial links drop, duplicate and flip bytes. The synchronizer hunts for the
//! start markers, accumulates one candidate frame and validates it. Anything
//! that fails validation is discarded locally and the hunt starts again, so a
//! corrupt frame never stops the stream.

use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::codec::{decode_frame, Frame, FrameConfig, CHECKSUM_SIZE, HEADER_SIZE, MARKER};
use crate::error::FrameError;

/// Where the synchronizer is within the current candidate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    SeekingMarker1,
    SeekingMarker2,
    ReadingHeader,
    ReadingPayload,
    VerifyingChecksum,
}

/// A frame that passed the checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Known kind, known devices.
    Frame(Frame),
    /// Intact frame whose kind tag has no mapping. Callers may log or ignore it.
    Unrecognized { tag: u8, payload: Bytes },
}

impl Received {
    /// Raw kind tag from the header.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Frame(frame) => frame.kind().as_u8(),
            Self::Unrecognized { tag, .. } => *tag,
        }
    }

    /// The payload bytes, whatever the kind.
    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Frame(frame) => &frame.payload,
            Self::Unrecognized { payload, .. } => payload,
        }
    }

    /// The decoded frame, if the kind is known.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Counters for everything the synchronizer accepted or threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncStats {
    /// Valid frames of a known kind.
    pub frames: u64,
    /// Valid frames of an unknown kind.
    pub unrecognized: u64,
    pub checksum_errors: u64,
    /// Candidates dropped because the declared length exceeded the limit.
    pub oversized: u64,
    /// Candidates with a valid checksum but an unknown device byte.
    pub malformed: u64,
    /// Candidates abandoned by the partial-frame timeout.
    pub timeouts: u64,
    /// Bytes thrown away while hunting for start markers.
    pub skipped_bytes: u64,
}

impl SyncStats {
    /// Total number of discarded candidate frames.
    pub fn discarded(&self) -> u64 {
        self.checksum_errors + self.oversized + self.malformed + self.timeouts
    }
}

/// Incremental frame parser. Feed it bytes in any chunking.
#[derive(Debug)]
pub struct Synchronizer {
    state: SyncState,
    // Header, payload and checksum of the current candidate; markers excluded.
    buf: BytesMut,
    payload_len: usize,
    started: Option<Instant>,
    config: FrameConfig,
    stats: SyncStats,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    /// Create a synchronizer with default limits.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a synchronizer with explicit limits.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            state: SyncState::SeekingMarker1,
            buf: BytesMut::with_capacity(HEADER_SIZE + config.max_payload_size + CHECKSUM_SIZE),
            payload_len: 0,
            started: None,
            config,
            stats: SyncStats::default(),
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<Received> {
        self.push_at(byte, Instant::now())
    }

    /// Feed one byte that arrived at `now`.
    pub fn push_at(&mut self, byte: u8, now: Instant) -> Option<Received> {
        if self.is_stale(now) {
            debug!(
                state = ?self.state,
                buffered = self.buf.len(),
                "partial frame timed out, discarding"
            );
            self.stats.timeouts += 1;
            self.reset();
        }

        match self.state {
            SyncState::SeekingMarker1 => {
                if byte == MARKER[0] {
                    self.state = SyncState::SeekingMarker2;
                    self.started = Some(now);
                } else {
                    self.stats.skipped_bytes += 1;
                }
                None
            }
            SyncState::SeekingMarker2 => {
                if byte == MARKER[1] {
                    self.state = SyncState::ReadingHeader;
                    self.buf.clear();
                } else if byte == MARKER[0] {
                    // The new byte may itself start the marker pair.
                    self.stats.skipped_bytes += 1;
                    self.started = Some(now);
                } else {
                    self.stats.skipped_bytes += 2;
                    self.reset();
                }
                None
            }
            SyncState::ReadingHeader => {
                self.buf.extend_from_slice(&[byte]);
                if self.buf.len() == HEADER_SIZE {
                    let declared = usize::from(self.buf[1]);
                    if declared > self.config.max_payload_size {
                        debug!(
                            declared,
                            max = self.config.max_payload_size,
                            "declared payload exceeds limit, discarding"
                        );
                        self.stats.oversized += 1;
                        self.reset();
                        return None;
                    }
                    self.payload_len = declared;
                    self.state = if declared == 0 {
                        SyncState::VerifyingChecksum
                    } else {
                        SyncState::ReadingPayload
                    };
                }
                None
            }
            SyncState::ReadingPayload => {
                self.buf.extend_from_slice(&[byte]);
                if self.buf.len() == HEADER_SIZE + self.payload_len {
                    self.state = SyncState::VerifyingChecksum;
                }
                None
            }
            SyncState::VerifyingChecksum => {
                self.buf.extend_from_slice(&[byte]);
                if self.buf.len() < HEADER_SIZE + self.payload_len + CHECKSUM_SIZE {
                    return None;
                }
                let outcome = decode_frame(&self.buf);
                self.reset();
                self.finish(outcome)
            }
        }
    }

    /// Feed a slice, collecting every frame it completes.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<Received> {
        let now = Instant::now();
        bytes
            .iter()
            .filter_map(|&byte| self.push_at(byte, now))
            .collect()
    }

    /// Drop any partial candidate and go back to hunting for markers.
    pub fn reset(&mut self) {
        self.state = SyncState::SeekingMarker1;
        self.buf.clear();
        self.payload_len = 0;
        self.started = None;
    }

    /// Current parser state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// `true` while a candidate frame is partly received.
    pub fn in_frame(&self) -> bool {
        self.state != SyncState::SeekingMarker1
    }

    /// Counters since creation.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Change the declared-length limit for subsequent candidates.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn is_stale(&self, now: Instant) -> bool {
        match (self.config.frame_timeout, self.started) {
            (Some(timeout), Some(started)) => now.saturating_duration_since(started) > timeout,
            _ => false,
        }
    }

    fn finish(&mut self, outcome: crate::Result<Frame>) -> Option<Received> {
        match outcome {
            Ok(frame) => {
                self.stats.frames += 1;
                Some(Received::Frame(frame))
            }
            Err(FrameError::UnknownMessageKind { tag, payload }) => {
                debug!(
                    tag = format_args!("0x{tag:02X}"),
                    len = payload.len(),
                    "unknown message kind"
                );
                self.stats.unrecognized += 1;
                Some(Received::Unrecognized { tag, payload })
            }
            Err(FrameError::ChecksumMismatch { received, computed }) => {
                debug!(
                    received = format_args!("0x{received:04X}"),
                    computed = format_args!("0x{computed:04X}"),
                    "checksum mismatch, discarding frame"
                );
                self.stats.checksum_errors += 1;
                None
            }
            Err(err) => {
                debug!(error = %err, "malformed frame, discarding");
                self.stats.malformed += 1;
                None
            }
        }
    }
}
