//! Connected byte streams for talking to a remote debugging peer.
//!
//! Remote debugging servers listen either on a TCP port or on a Unix domain
//! socket. This crate hides the difference behind [`RemoteStream`], a plain
//! `Read + Write` stream that can be cloned into independent read and write
//! halves.
//!
//! This is the lowest layer of rdpwire. Framing and request correlation are
//! built on top of the streams provided here.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::RemoteStream;
pub use tcp::TcpTransport;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
