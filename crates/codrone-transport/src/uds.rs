use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Connect to a Unix domain socket that bridges the serial port (blocking).
pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
        addr: path.display().to_string(),
        source: e,
    })?;
    debug!(?path, "connected to unix socket bridge");
    Ok(LinkStream::from(stream))
}
