use rdpwire_frame::FrameError;
use rdpwire_transport::TransportError;

/// Errors returned synchronously from peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An outbound stream is already installed on this protocol.
    #[error("protocol is already attached to a stream")]
    AlreadyAttached,

    /// The pending slot was consumed without producing a reply value.
    ///
    /// Happens when the reply failed to decode or the protocol was dropped
    /// while the request was still outstanding.
    #[error("reply dropped before it could be delivered")]
    ReplyDropped,

    /// The inbound pump thread could not be started.
    #[error("failed to spawn inbound thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A listener panicked on the inbound pump thread.
    #[error("inbound thread panicked")]
    InboundPanicked,
}

pub type Result<T> = std::result::Result<T, PeerError>;

/// Fault carried by an `Error` notification.
///
/// These never abort the stream: the protocol keeps running and the
/// listeners decide what to do.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolFault {
    /// The packet header could not be parsed.
    #[error("received error packet: {0}")]
    Framing(#[source] FrameError),

    /// A framed payload was not valid JSON, or did not match the reply type.
    ///
    /// `chunk` is the raw input chunk that completed the payload.
    #[error("received error packet: invalid content: {chunk}")]
    InvalidContent {
        chunk: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading from the inbound stream failed.
    #[error("input stream error: {0}")]
    InputStream(#[source] std::io::Error),

    /// Writing a request to the outbound stream failed.
    #[error("error happened in send request: {0}")]
    OutputStream(#[source] FrameError),
}

impl ProtocolFault {
    pub(crate) fn invalid_content(chunk: &[u8], source: serde_json::Error) -> Self {
        ProtocolFault::InvalidContent {
            chunk: String::from_utf8_lossy(chunk).into_owned(),
            source,
        }
    }

    /// True for faults caused by bytes received from the peer.
    pub fn is_inbound_data(&self) -> bool {
        matches!(
            self,
            ProtocolFault::Framing(_) | ProtocolFault::InvalidContent { .. }
        )
    }
}
