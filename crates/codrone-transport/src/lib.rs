//! Byte-stream transport for the CoDrone EDU link.
//!
//! The controller is reached over a serial line. Opening the serial device is
//! left to the host; this crate talks to it through a stream bridge:
//! - TCP (e.g. `ser2net` exposing the port on the network)
//! - Unix domain sockets (e.g. `socat` exposing the port locally)
//!
//! Everything above this layer only needs [`LinkStream`], which is `Read + Write`.

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::LinkStream;
