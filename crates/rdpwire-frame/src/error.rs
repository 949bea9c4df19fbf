/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The bytes before the `:` separator are not a plain decimal number.
    #[error("invalid length {header:?}")]
    InvalidLength { header: String },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete packet was received.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors caused by the bytes on the wire rather than the stream.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidLength { .. } | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
