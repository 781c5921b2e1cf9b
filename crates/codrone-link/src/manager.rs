use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};
use std::time::Duration;

use codrone_frame::{DeviceType, Frame, FrameWriter, MessageKind, Received};
use tracing::{debug, trace, warn};

use crate::ack::{AckCoordinator, Expectation, WaitOutcome};
use crate::config::{LinkConfig, RetryPolicy};
use crate::error::{LinkError, Result};
use crate::message::{Command, CommandType, Message, Request};
use crate::rate::RateLimiter;
use crate::status::StatusStore;

type BoxedWriter = FrameWriter<Box<dyn Write + Send>>;

/// Entry point for everything that crosses the link.
///
/// Outbound frames are serialized through one writer and spaced by the rate
/// limiter. Inbound frames arrive through [`on_frame_received`], which only
/// stores and signals and never blocks on I/O.
///
/// [`on_frame_received`]: LinkManager::on_frame_received
pub struct LinkManager {
    writer: Mutex<BoxedWriter>,
    limiter: RateLimiter,
    acks: AckCoordinator,
    status: StatusStore,
    config: LinkConfig,
    closed: AtomicBool,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("limiter", &self.limiter)
            .field("pending_acks", &self.acks.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    /// Manager writing frames to `writer`.
    pub fn new<W: Write + Send + 'static>(writer: W, config: LinkConfig) -> Self {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        Self {
            writer: Mutex::new(FrameWriter::with_config(boxed, config.frame.clone())),
            limiter: RateLimiter::new(config.min_interval),
            acks: AckCoordinator::new(),
            status: StatusStore::new(),
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Send with the default addressing.
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.send_to(message, self.config.source, self.config.destination)
    }

    /// Send with explicit addressing.
    pub fn send_to(&self, message: impl Into<Message>, from: DeviceType, to: DeviceType) -> Result<()> {
        let message = message.into();
        let frame = Frame::new(message.kind(), from, to, message.to_payload())?;
        self.transmit(&frame)
    }

    /// Send raw payload bytes under `kind`.
    pub fn send_raw(&self, kind: MessageKind, payload: &[u8]) -> Result<()> {
        let frame = Frame::new(
            kind,
            self.config.source,
            self.config.destination,
            payload.to_vec(),
        )?;
        self.transmit(&frame)
    }

    /// Send only if the link can take a frame right now.
    ///
    /// Returns `Ok(false)` without writing when another send holds the
    /// writer or the minimum interval has not elapsed. Suits streamed
    /// control input, where a dropped sample is replaced by the next one.
    pub fn try_send(&self, message: impl Into<Message>) -> Result<bool> {
        let message = message.into();
        let frame = Frame::new(
            message.kind(),
            self.config.source,
            self.config.destination,
            message.to_payload(),
        )?;
        self.ensure_open()?;

        let mut writer = match self.writer.try_lock() {
            Ok(writer) => writer,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(false),
        };
        if !self.limiter.try_acquire() {
            trace!(kind = %frame.kind(), "rate limited, frame skipped");
            return Ok(false);
        }
        writer
            .write_frame(&frame)
            .map_err(LinkError::TransportWrite)?;
        Ok(true)
    }

    /// Send a [`Command`].
    pub fn send_command(&self, command: CommandType, option: u8) -> Result<()> {
        self.send(Command::new(command, option))
    }

    /// Ask the drone to send one frame of `kind`. Does not wait for it.
    pub fn request(&self, kind: MessageKind) -> Result<()> {
        self.send(Request { kind })
    }

    /// Request `kind` and wait for the answer.
    pub fn request_and_wait(&self, kind: MessageKind, timeout: Duration) -> Result<Message> {
        self.ensure_open()?;
        let ticket = self.acks.register(Expectation::Data(kind));
        self.request(kind)?;

        match ticket.wait(timeout) {
            WaitOutcome::Resolved => self.status.get(kind).ok_or(LinkError::Timeout {
                kind,
                after: timeout,
            }),
            WaitOutcome::TimedOut => Err(LinkError::Timeout {
                kind,
                after: timeout,
            }),
            WaitOutcome::Cancelled => Err(LinkError::Cancelled { kind }),
        }
    }

    /// Send and wait for the drone to acknowledge, using the configured policy.
    pub fn send_and_confirm(&self, message: impl Into<Message>) -> Result<()> {
        self.send_and_confirm_with(message, self.config.retry)
    }

    /// Send and wait for the drone to acknowledge.
    ///
    /// The frame is re-sent after every attempt timeout, up to
    /// `policy.max_attempts` transmissions. A lost frame and a lost
    /// acknowledgment look the same here; both are retried.
    pub fn send_and_confirm_with(
        &self,
        message: impl Into<Message>,
        policy: RetryPolicy,
    ) -> Result<()> {
        let message = message.into();
        let kind = message.kind();
        let frame = Frame::new(
            kind,
            self.config.source,
            self.config.destination,
            message.to_payload(),
        )?;
        self.ensure_open()?;

        let attempts = policy.max_attempts.max(1);
        let ticket = self.acks.register(Expectation::Ack(kind));
        for attempt in 1..=attempts {
            self.transmit(&frame)?;
            match ticket.wait(policy.attempt_timeout) {
                WaitOutcome::Resolved => {
                    debug!(%kind, attempt, "acknowledged");
                    return Ok(());
                }
                WaitOutcome::Cancelled => return Err(LinkError::Cancelled { kind }),
                WaitOutcome::TimedOut => {
                    warn!(%kind, attempt, max_attempts = attempts, "acknowledgment not received");
                }
            }
        }

        Err(LinkError::DeliveryFailed { kind, attempts })
    }

    /// Route one inbound frame: store it, then wake whoever waits for it.
    pub fn on_frame_received(&self, received: Received) {
        let frame = match received {
            Received::Frame(frame) => frame,
            Received::Unrecognized { tag, payload } => {
                debug!(
                    tag = format_args!("0x{tag:02X}"),
                    len = payload.len(),
                    "ignoring frame of unknown kind"
                );
                return;
            }
        };

        let message = Message::from_frame(&frame);
        let kind = message.kind();
        trace!(%kind, from = %frame.header.from, len = frame.payload.len(), "frame received");

        if let Message::Ack(ack) = &message {
            if !self.acks.resolve(Expectation::Ack(ack.acked)) {
                warn!(kind = %ack.acked, "unexpected acknowledgment");
            }
        }

        self.status.update(message);
        self.acks.resolve(Expectation::Data(kind));
    }

    /// Latest telemetry.
    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Number of callers waiting for an acknowledgment or data.
    pub fn pending_waiters(&self) -> usize {
        self.acks.len()
    }

    /// Refuse further sends and cancel everyone waiting.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("link manager closed");
        }
        self.acks.cancel_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    // The writer lock is taken before the limiter so write order matches
    // permit order.
    fn transmit(&self, frame: &Frame) -> Result<()> {
        self.ensure_open()?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.limiter.acquire();
        writer
            .write_frame(frame)
            .map_err(LinkError::TransportWrite)?;
        trace!(kind = %frame.kind(), len = frame.payload.len(), "frame sent");
        Ok(())
    }
}
