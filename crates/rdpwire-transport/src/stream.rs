use std::io::{Read, Write};
use std::net::Shutdown;
use std::time::Duration;

use crate::error::Result;

/// A connected stream to a remote peer. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a TCP stream or, on Unix, a Unix domain socket stream.
pub struct RemoteStream {
    inner: RemoteStreamInner,
}

enum RemoteStreamInner {
    Tcp(std::net::TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for RemoteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RemoteStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for RemoteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RemoteStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            RemoteStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl RemoteStream {
    /// Create a RemoteStream from a TCP stream.
    ///
    /// Nagle is disabled: request packets are small and latency-sensitive.
    pub fn from_tcp(stream: std::net::TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self {
            inner: RemoteStreamInner::Tcp(stream),
        }
    }

    /// Create a RemoteStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RemoteStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RemoteStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RemoteStreamInner::Tcp(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The clone shares the connection, so one copy can be handed to a reader
    /// thread while the other is used for writing.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            RemoteStreamInner::Tcp(stream) => Ok(Self {
                inner: RemoteStreamInner::Tcp(stream.try_clone()?),
            }),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down the read half, write half, or both halves of the connection.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        match &self.inner {
            RemoteStreamInner::Tcp(stream) => stream.shutdown(how).map_err(Into::into),
            #[cfg(unix)]
            RemoteStreamInner::Unix(stream) => stream.shutdown(how).map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            RemoteStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            RemoteStreamInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            RemoteStreamInner::Tcp(stream) => f
                .debug_struct("RemoteStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
            #[cfg(unix)]
            RemoteStreamInner::Unix(_) => f
                .debug_struct("RemoteStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}
