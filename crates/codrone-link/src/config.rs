use std::time::Duration;

use codrone_frame::{DeviceType, FrameConfig};

/// Default gap between two outbound frames (about 16 commands per second).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(60);

/// Attempts made by a confirmed send before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Wait for an acknowledgment per attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(200);

/// Write timeout applied to a link's stream, so a stalled bridge surfaces
/// as a write error instead of blocking the sender.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Retry schedule for confirmed sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of transmissions, including the first.
    pub max_attempts: u32,
    /// How long each attempt waits for its acknowledgment.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Worst-case time a confirmed send spends waiting.
    pub fn worst_case(&self) -> Duration {
        self.attempt_timeout * self.max_attempts
    }
}

/// Configuration for a [`Link`](crate::Link) and its manager.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Minimum gap between outbound frames.
    pub min_interval: Duration,
    pub retry: RetryPolicy,
    /// Default source address for outbound frames.
    pub source: DeviceType,
    /// Default destination address for outbound frames.
    pub destination: DeviceType,
    /// Framing limits and the write timeout. `frame.read_timeout` is
    /// replaced by `read_poll` when a [`Link`](crate::Link) opens.
    pub frame: FrameConfig,
    /// Read timeout used by the reader thread to notice shutdown.
    pub read_poll: Duration,
    /// The reader gives up after this many I/O errors in a row.
    pub max_consecutive_read_errors: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            retry: RetryPolicy::default(),
            source: DeviceType::Base,
            destination: DeviceType::Drone,
            frame: FrameConfig {
                write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
                ..FrameConfig::default()
            },
            read_poll: Duration::from_millis(100),
            max_consecutive_read_errors: 5,
        }
    }
}
