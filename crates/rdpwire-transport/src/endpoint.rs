use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::stream::RemoteStream;
use crate::tcp::TcpTransport;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where a remote peer listens.
///
/// Parsed from strings of the form:
/// - `unix:/run/debug.sock` or any string containing `/`: Unix domain socket
/// - `tcp:localhost:6000` or `localhost:6000`: TCP
/// - `6000`: TCP on `127.0.0.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    /// Open a blocking connection to this endpoint.
    pub fn connect(&self) -> Result<RemoteStream> {
        match self {
            Endpoint::Tcp(addr) => TcpTransport::connect(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("endpoint is empty"));
        }

        if let Some(path) = trimmed.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let addr = trimmed.strip_prefix("tcp:").unwrap_or(trimmed);
        if addr.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(addr)));
        }
        if !addr.is_empty() && addr.bytes().all(|b| b.is_ascii_digit()) {
            addr.parse::<u16>().map_err(|_| invalid("port out of range"))?;
            return Ok(Endpoint::Tcp(format!("127.0.0.1:{addr}")));
        }

        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(addr.to_string()))
            }
            _ => Err(invalid("expected host:port, a port, or a socket path")),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// A listening endpoint that yields [`RemoteStream`]s.
pub enum Listener {
    Tcp(TcpTransport),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    /// Bind to `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => TcpTransport::bind(addr).map(Listener::Tcp),
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::bind(path).map(Listener::Unix),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<RemoteStream> {
        match self {
            Listener::Tcp(listener) => listener.accept(),
            #[cfg(unix)]
            Listener::Unix(listener) => listener.accept(),
        }
    }

    /// The endpoint clients should connect to.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Listener::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
            #[cfg(unix)]
            Listener::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
        }
    }
}
