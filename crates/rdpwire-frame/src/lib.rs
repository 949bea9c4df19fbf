//! Incremental `length:payload` packet framing.
//!
//! Remote debugging peers exchange packets of the form
//!
//! ```text
//! <decimal byte length> ':' <payload bytes>
//! ```
//!
//! concatenated back to back with no other delimiter. The length counts bytes
//! of the UTF-8 encoded payload, never characters. Reads from a socket arrive
//! in arbitrary chunks, so the decoder keeps a resumable [`ParseCursor`] and
//! hands out complete payloads as soon as their last byte is buffered.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod writer;

pub use codec::{
    encode_packet, packet_wire_size, FrameConfig, PacketDecoder, Packets, ParseCursor,
    DEFAULT_MAX_PAYLOAD, MAX_HEADER_LEN, SEPARATOR,
};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
#[cfg(feature = "async")]
pub use tokio_codec::PacketCodec;
pub use writer::PacketWriter;
