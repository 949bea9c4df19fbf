use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Separator between the decimal length and the payload.
pub const SEPARATOR: u8 = b':';

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Longest header echoed back in an [`FrameError::InvalidLength`].
const HEADER_PREVIEW_LEN: usize = 32;

/// Longest digit run accepted before the separator.
///
/// `usize::MAX` has 20 digits; the rest is room for leading zeros.
pub const MAX_HEADER_LEN: usize = 64;

/// The total wire size of a packet carrying `payload_len` bytes.
pub fn packet_wire_size(payload_len: usize) -> usize {
    let mut digits = 1;
    let mut rest = payload_len / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits + 1 + payload_len
}

/// Encode a payload into the wire format.
///
/// ```text
/// ┌────────────────────┬─────┬─────────────────────┐
/// │ Length (ASCII dec) │ ':' │ Payload              │
/// │ byte count         │     │ (Length bytes)       │
/// └────────────────────┴─────┴─────────────────────┘
/// ```
pub fn encode_packet(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(packet_wire_size(payload.len()));
    dst.put_slice(payload.len().to_string().as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(payload);
}

/// Resumable position inside the packet at the front of a buffer.
///
/// Header bytes are scanned once: `scanned` remembers how far the digit run
/// has been checked, so a header split over many reads is never rescanned.
/// Once the separator has been found its offset is remembered, and once the
/// length has been parsed it is remembered too. Extraction resets the cursor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseCursor {
    scanned: usize,
    body_start: Option<usize>,
    body_len: Option<usize>,
    bad_header: bool,
    discarding: bool,
}

impl ParseCursor {
    /// Offset of the first payload byte, if the separator has been seen.
    pub fn body_start(&self) -> Option<usize> {
        self.body_start
    }

    /// Expected payload length, if the header has been parsed.
    pub fn body_len(&self) -> Option<usize> {
        self.body_len
    }

    /// True when no part of the next header has been recognised yet.
    pub fn is_awaiting_header(&self) -> bool {
        self.body_start.is_none() && !self.bad_header
    }

    /// True when the header at the front of the buffer can never parse.
    ///
    /// Nothing behind it can be extracted until it is skipped.
    pub fn is_stalled(&self) -> bool {
        self.bad_header || (self.body_start.is_some() && self.body_len.is_none())
    }

    /// Forget everything about the current packet.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Try to cut one complete packet off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A header is rejected as
    /// soon as a byte other than a digit or the separator shows up, or once
    /// the digit run grows past [`MAX_HEADER_LEN`]. A rejected header is left
    /// in place; calling again reports it again.
    pub fn extract(&mut self, buf: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
        if self.discarding {
            match buf.iter().position(|&b| b == SEPARATOR) {
                Some(sep) => {
                    buf.advance(sep + 1);
                    self.discarding = false;
                }
                None => {
                    buf.clear();
                    return Ok(None);
                }
            }
        }
        if self.bad_header {
            return Err(invalid_header(buf));
        }

        let body_start = match self.body_start {
            Some(start) => start,
            None => {
                let from = self.scanned;
                match buf[from..].iter().position(|b| !b.is_ascii_digit()) {
                    Some(offset)
                        if buf[from + offset] == SEPARATOR && from + offset <= MAX_HEADER_LEN =>
                    {
                        let start = from + offset + 1;
                        self.body_start = Some(start);
                        start
                    }
                    Some(offset) => {
                        self.scanned = from + offset;
                        self.bad_header = true;
                        return Err(invalid_header(buf));
                    }
                    None => {
                        self.scanned = buf.len();
                        if self.scanned > MAX_HEADER_LEN {
                            self.bad_header = true;
                            return Err(invalid_header(buf));
                        }
                        return Ok(None);
                    }
                }
            }
        };

        let body_len = match self.body_len {
            Some(len) => len,
            None => {
                let len = parse_length(&buf[..body_start - 1], max_payload)?;
                self.body_len = Some(len);
                len
            }
        };

        if buf.len() - body_start < body_len {
            return Ok(None);
        }

        buf.advance(body_start);
        let payload = buf.split_to(body_len).freeze();
        self.reset();
        Ok(Some(payload))
    }

    /// Drop the rejected header at the front of `buf`, up to and including
    /// the next separator, so parsing can resume with the bytes after it.
    ///
    /// When no separator is buffered yet, everything buffered is dropped and
    /// later bytes are dropped too until one arrives. Returns the number of
    /// bytes discarded; zero if there was nothing to skip.
    pub fn skip_header(&mut self, buf: &mut BytesMut) -> usize {
        let end = match self.body_start {
            Some(start) => start,
            None if self.bad_header => {
                let from = self.scanned;
                match buf[from..].iter().position(|&b| b == SEPARATOR) {
                    Some(offset) => from + offset + 1,
                    None => {
                        let dropped = buf.len();
                        buf.clear();
                        self.reset();
                        self.discarding = true;
                        return dropped;
                    }
                }
            }
            None => return 0,
        };
        buf.advance(end);
        self.reset();
        end
    }
}

fn invalid_header(buf: &[u8]) -> FrameError {
    let window = &buf[..buf.len().min(HEADER_PREVIEW_LEN)];
    let end = window
        .iter()
        .position(|&b| b == SEPARATOR)
        .unwrap_or(window.len());
    FrameError::InvalidLength {
        header: String::from_utf8_lossy(&window[..end]).into_owned(),
    }
}

fn parse_length(header: &[u8], max_payload: usize) -> Result<usize> {
    let invalid = || FrameError::InvalidLength {
        header: String::from_utf8_lossy(&header[..header.len().min(HEADER_PREVIEW_LEN)])
            .into_owned(),
    };

    if header.is_empty() {
        return Err(invalid());
    }

    // The scan only lets ASCII digits through; parse fails only on overflow.
    let len: usize = std::str::from_utf8(header)
        .ok()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(invalid)?;

    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }
    Ok(len)
}

/// Stateful packet decoder over an internal growable buffer.
///
/// Feed it raw chunks exactly as they come off the stream; it yields every
/// payload that becomes complete, in order.
#[derive(Debug)]
pub struct PacketDecoder {
    buf: BytesMut,
    cursor: ParseCursor,
    max_payload: usize,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketDecoder {
    /// Create a decoder with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a decoder with an explicit payload limit.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            cursor: ParseCursor::default(),
            max_payload,
        }
    }

    /// Append a chunk to the internal buffer without extracting anything.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete payload, if one is buffered.
    pub fn next_packet(&mut self) -> Result<Option<Bytes>> {
        self.cursor.extract(&mut self.buf, self.max_payload)
    }

    /// Append `chunk` and iterate over every payload it completes.
    ///
    /// The iterator stops at the first framing error, after yielding it.
    pub fn feed(&mut self, chunk: &[u8]) -> Packets<'_> {
        self.extend(chunk);
        Packets {
            decoder: self,
            done: false,
        }
    }

    /// Discard a malformed header so decoding can continue after it.
    pub fn skip_malformed_header(&mut self) -> usize {
        self.cursor.skip_header(&mut self.buf)
    }

    /// Bytes buffered but not yet returned as part of a payload.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current parse position.
    pub fn cursor(&self) -> ParseCursor {
        self.cursor
    }

    /// True when a rejected header blocks everything buffered behind it.
    pub fn is_stalled(&self) -> bool {
        self.cursor.is_stalled()
    }
}

/// Payloads completed by one [`PacketDecoder::feed`] call.
pub struct Packets<'a> {
    decoder: &'a mut PacketDecoder,
    done: bool,
}

impl Iterator for Packets<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.next_packet() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Configuration for packet readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
