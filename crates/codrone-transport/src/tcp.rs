use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Connect to a serial-over-TCP bridge (blocking).
///
/// Every resolved address is tried in turn; the last failure is reported.
/// Nagle is disabled since frames are small and latency-sensitive.
pub fn connect(addr: &str, timeout: Duration) -> Result<LinkStream> {
    let addrs = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
        addr: addr.to_string(),
        source: e,
    })?;

    let mut last_err = None;
    for resolved in addrs {
        match TcpStream::connect_timeout(&resolved, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%resolved, "connected to tcp bridge");
                return Ok(LinkStream::from(stream));
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(TransportError::Connect {
        addr: addr.to_string(),
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        }),
    })
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connect_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).unwrap();
            buf
        });

        let mut stream = connect(&addr, Duration::from_secs(1)).unwrap();
        stream.write_all(b"abc").unwrap();
        assert_eq!(&server.join().unwrap(), b"abc");
        assert_eq!(stream.transport_name(), "tcp");
    }

    #[test]
    fn connect_refused_reports_address() {
        // Bind then drop to obtain a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let err = connect(&addr, Duration::from_millis(200)).unwrap_err();
        match err {
            TransportError::Connect { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unresolvable_address_is_connect_error() {
        let err = connect("not an address", Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
