use std::io::{ErrorKind, Read};

use bytes::Bytes;
use rdpwire_transport::RemoteStream;

use crate::codec::{FrameConfig, PacketDecoder};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete packet payloads from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete payloads.
pub struct PacketReader<T> {
    inner: T,
    decoder: PacketDecoder,
    config: FrameConfig,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: PacketDecoder::with_max_payload(config.max_payload_size),
            config,
        }
    }

    /// Read the next complete payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, and
    /// the framing error itself when the stream carries a malformed header.
    pub fn read_packet(&mut self) -> Result<Bytes> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(payload) = self.decoder.next_packet()? {
                return Ok(payload);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.extend(&chunk[..read]);
        }
    }

    /// True when a clean EOF here would not cut a packet in half.
    pub fn is_at_boundary(&self) -> bool {
        self.decoder.buffered() == 0
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current packet reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl PacketReader<RemoteStream> {
    /// Create a packet reader for a `RemoteStream` and apply the read timeout.
    pub fn with_config_remote(inner: RemoteStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: rdpwire_transport::TransportError) -> FrameError {
    match err {
        rdpwire_transport::TransportError::Io(io)
        | rdpwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        rdpwire_transport::TransportError::Bind { source, .. }
        | rdpwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
