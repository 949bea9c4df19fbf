use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RemoteStream;

/// TCP transport, the usual way a remote debugging server is exposed.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:6000`, or port `0` for any).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            endpoint: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RemoteStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted tcp connection");
        Ok(RemoteStream::from_tcp(stream))
    }

    /// Connect to `addr`, trying each resolved address in turn.
    pub fn connect(addr: &str) -> Result<RemoteStream> {
        let connect_err = |source| TransportError::Connect {
            endpoint: addr.to_string(),
            source,
        };
        let mut last_err = None;
        for candidate in addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    debug!(%candidate, "connected over tcp");
                    return Ok(RemoteStream::from_tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        })))
    }

    /// The address actually bound (useful after binding port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect(&addr).unwrap();
            client.write_all(b"2:[]").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"2:[]");
        assert_eq!(server.transport_name(), "tcp");

        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_is_reported() {
        // Bind then drop to find a port that is very likely closed.
        let addr = TcpTransport::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .to_string();
        let err = TcpTransport::connect(&addr).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
