//! Link management for the CoDrone EDU protocol.
//!
//! Sits on top of `codrone-frame` and adds what the bare framing does not
//! know about:
//! - typed payload layouts ([`message`])
//! - confirmed delivery with bounded retries ([`ack`])
//! - spacing of outbound frames so the radio link is not flooded ([`rate`])
//! - the latest telemetry per message kind ([`status`])
//!
//! [`LinkManager`] ties these together; [`Link`] runs it over a
//! [`LinkStream`](codrone_transport::LinkStream) with a background reader.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use codrone_link::{Command, Link, LinkConfig, MessageKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = codrone_transport::tcp::connect("127.0.0.1:2000", Duration::from_secs(2))?;
//! let link = Link::open(stream, LinkConfig::default())?;
//!
//! link.send_and_confirm(Command::stop())?;
//! let state = link.request_and_wait(MessageKind::State, Duration::from_millis(500))?;
//! println!("{state:?}");
//! # Ok(())
//! # }
//! ```

pub mod ack;
pub mod config;
pub mod error;
pub mod link;
pub mod manager;
pub mod message;
pub mod rate;
pub mod status;

pub use ack::{AckCoordinator, Expectation, Ticket, WaitOutcome};
pub use codrone_frame::{DeviceType, MessageKind};
pub use config::{
    LinkConfig, RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_INTERVAL,
    DEFAULT_WRITE_TIMEOUT,
};
pub use error::{LinkError, PayloadError, Result};
pub use link::Link;
pub use manager::LinkManager;
pub use message::{
    Ack, Altitude, Attitude, Command, CommandType, ControlQuad8, Count, ErrorReport, FlightEvent,
    Flow, Message, ModeFlight, Motion, Payload, Ping, Position, Range, Request, Rssi, State, Trim,
};
pub use rate::RateLimiter;
pub use status::{StatusEntry, StatusStore};
