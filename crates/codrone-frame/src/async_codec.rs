//! `tokio_util` codec over the same synchronizer, for async byte streams.

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::FrameError;
use crate::sync::{Received, SyncStats, Synchronizer};

/// Codec for CoDrone frames.
///
/// Decoding never fails on line noise; corrupt candidates are counted in
/// [`DroneCodec::stats`] and skipped.
#[derive(Debug, Default)]
pub struct DroneCodec {
    sync: Synchronizer,
    pending: VecDeque<Received>,
}

impl DroneCodec {
    /// Create a codec with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit limits.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            sync: Synchronizer::with_config(config),
            pending: VecDeque::new(),
        }
    }

    /// Synchronizer counters.
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }
}

impl Decoder for DroneCodec {
    type Item = Received;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_empty() && !src.is_empty() {
            let input = src.split();
            self.pending.extend(self.sync.push_slice(&input));
        }
        Ok(self.pending.pop_front())
    }
}

impl Encoder<Frame> for DroneCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item.header, item.payload.as_ref(), dst)
    }
}
