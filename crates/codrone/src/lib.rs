//! Link layer for the CoDrone EDU educational drone.
//!
//! The drone and its controller speak a small binary protocol over a serial
//! line. This crate covers the part of an SDK that turns application calls
//! into bytes on that line and bytes back into telemetry.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte streams to a serial bridge (TCP or Unix socket)
//! - [`frame`]: CRC-16, frame codec and the resynchronizing byte-stream parser
//! - [`link`]: typed payloads, confirmed delivery, rate limiting and the status store

/// Re-export transport types.
pub mod transport {
    pub use codrone_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use codrone_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use codrone_link::*;
}
