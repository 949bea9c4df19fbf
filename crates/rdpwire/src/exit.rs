use std::fmt;
use std::io;

use rdpwire_frame::FrameError;
use rdpwire_peer::PeerError;
use rdpwire_transport::TransportError;

// Exit codes follow sysexits-style ranges.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        err if err.is_framing() => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        err => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PeerError::ReplyDropped => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other @ (PeerError::AlreadyAttached
        | PeerError::Spawn(_)
        | PeerError::InboundPanicked) => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = io_error("read", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(err.to_string(), "read: timed out");
    }

    #[test]
    fn refused_connection_is_failure() {
        let err = peer_error(
            "connect failed",
            PeerError::Transport(TransportError::Connect {
                endpoint: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn bad_wire_data_is_data_invalid() {
        let err = frame_error(
            "decode failed",
            FrameError::InvalidLength {
                header: "x".to_string(),
            },
        );
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(peer_error("reply", PeerError::ReplyDropped).code, DATA_INVALID);
    }

    #[test]
    fn stream_and_thread_failures_are_not_data_errors() {
        assert_eq!(
            frame_error("receive failed", FrameError::ConnectionClosed).code,
            FAILURE
        );
        assert_eq!(
            peer_error("close failed", PeerError::InboundPanicked).code,
            INTERNAL
        );
    }

    #[test]
    fn invalid_endpoint_is_transport_error() {
        let err = transport_error(
            "bad endpoint",
            TransportError::InvalidEndpoint {
                input: "nope".to_string(),
                reason: "expected host:port, a port, or a socket path",
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
