use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use codrone_transport::LinkStream;

use crate::codec::{encode_frame, Frame, FrameConfig, Header, CHECKSUM_SIZE, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::kind::{DeviceType, MessageKind};

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(2 + HEADER_SIZE + u8::MAX as usize + CHECKSUM_SIZE),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(&frame.header, frame.payload.as_ref(), &mut self.buf)?;
        self.write_buf()
    }

    /// Encode and send a payload of `kind` from one device to another.
    pub fn send(
        &mut self,
        kind: MessageKind,
        from: DeviceType,
        to: DeviceType,
        payload: &[u8],
    ) -> Result<()> {
        let header = Header::new(kind, payload.len(), from, to)?;
        self.buf.clear();
        encode_frame(&header, payload, &mut self.buf)?;
        self.write_buf()
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if self.retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if self.retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    // With a write timeout set, `WouldBlock` means the timeout expired
    // (SO_SNDTIMEO reports EAGAIN), so it is an error like `TimedOut`.
    fn retryable(&self, err: &std::io::Error) -> bool {
        match err.kind() {
            ErrorKind::Interrupted => true,
            ErrorKind::WouldBlock => self.config.write_timeout.is_none(),
            _ => false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<LinkStream> {
    /// Create a frame writer for `LinkStream` and apply the write timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
