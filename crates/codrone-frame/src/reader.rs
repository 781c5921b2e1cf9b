use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use codrone_transport::LinkStream;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::sync::{Received, SyncStats, Synchronizer};

// Serial bridges deliver a few bytes at a time; one frame is at most 263.
const READ_CHUNK_SIZE: usize = 512;

/// Reads validated frames from any `Read` stream.
///
/// Noise and corrupt frames are dropped by the inner [`Synchronizer`];
/// callers only see frames that passed the checksum.
pub struct FrameReader<T> {
    inner: T,
    sync: Synchronizer,
    pending: VecDeque<Received>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            sync: Synchronizer::with_config(config),
            pending: VecDeque::new(),
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF. Read timeouts from
    /// the underlying stream surface as `FrameError::Io` with kind
    /// `WouldBlock` or `TimedOut`; the partial frame is kept and the next call
    /// resumes it.
    pub fn read_frame(&mut self) -> Result<Received> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(received) = self.pending.pop_front() {
                return Ok(received);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend(self.sync.push_slice(&chunk[..read]));
        }
    }

    /// Discard a partially received frame and any frames not yet returned.
    pub fn reset(&mut self) {
        self.sync.reset();
        self.pending.clear();
    }

    /// Synchronizer counters.
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.sync.set_max_payload_size(max_payload_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.sync.config()
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply the read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
