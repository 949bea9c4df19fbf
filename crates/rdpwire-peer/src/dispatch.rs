//! Inbound correlation: framed payloads are matched to pending slots in
//! FIFO order, and anything left over becomes an event.

use bytes::Bytes;
use rdpwire_frame::{FrameError, PacketDecoder};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::ProtocolConfig;
use crate::error::ProtocolFault;
use crate::json::decode_payload;
use crate::notify::Notification;
use crate::pending::{PendingQueue, Slot};

/// One unit of work produced by [`Dispatcher::feed`].
///
/// Deliveries are produced under the dispatcher lock and run after it is
/// released, so reply callbacks may issue new requests.
#[derive(Debug)]
pub enum Delivery {
    /// A payload that answers the oldest outstanding request.
    Reply { slot: Slot, payload: Bytes },
    /// A payload that arrived with no request outstanding.
    Event(Bytes),
    /// A header that could not be parsed.
    Framing(FrameError),
}

impl Delivery {
    /// Run the delivery. `chunk` is the input chunk that produced it and is
    /// quoted in content errors.
    pub fn deliver(self, chunk: &[u8], emit: &mut impl FnMut(Notification)) {
        match self {
            Delivery::Reply { slot, payload } => {
                if let Err(source) = slot.resolve(&payload) {
                    debug!(error = %source, "reply failed to decode");
                    emit(Notification::Error(ProtocolFault::invalid_content(
                        chunk, source,
                    )));
                }
            }
            Delivery::Event(payload) => match decode_payload::<Value>(&payload) {
                Ok(body) => emit(Notification::Event(body)),
                Err(source) => emit(Notification::Error(ProtocolFault::invalid_content(
                    chunk, source,
                ))),
            },
            Delivery::Framing(err) => emit(Notification::Error(ProtocolFault::Framing(err))),
        }
    }
}

/// Packet decoder plus the queue of outstanding requests.
#[derive(Debug)]
pub struct Dispatcher {
    decoder: PacketDecoder,
    pending: PendingQueue,
    resync: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(&ProtocolConfig::default())
    }
}

impl Dispatcher {
    pub fn new(config: &ProtocolConfig) -> Self {
        let mut pending = PendingQueue::new();
        if config.expect_greeting {
            pending.push(Slot::Discard);
        }
        Self {
            decoder: PacketDecoder::with_max_payload(config.frame.max_payload_size),
            pending,
            resync: config.resync_on_malformed_header,
        }
    }

    /// Register the slot for a request about to be written.
    pub fn push(&mut self, slot: Slot) {
        self.pending.push(slot);
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes received but not yet consumed by a complete packet.
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    /// Append `chunk` and extract every packet it completes.
    ///
    /// Each complete payload consumes exactly one pending slot, or becomes an
    /// event when none is left. A malformed header yields a `Framing`
    /// delivery and stops parsing for this chunk; the header stays buffered
    /// unless resync is enabled, and later chunks are dropped since nothing
    /// behind it can ever be extracted.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Delivery> {
        if !self.resync && self.decoder.is_stalled() {
            trace!(dropped = chunk.len(), "decoder stalled on malformed header");
        } else {
            self.decoder.extend(chunk);
        }

        let mut deliveries = Vec::new();
        loop {
            match self.decoder.next_packet() {
                Ok(Some(payload)) => {
                    let delivery = match self.pending.pop() {
                        Some(slot) => {
                            trace!(len = payload.len(), remaining = self.pending.len(), "reply");
                            Delivery::Reply { slot, payload }
                        }
                        None => {
                            trace!(len = payload.len(), "event");
                            Delivery::Event(payload)
                        }
                    };
                    deliveries.push(delivery);
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(error = %err, "malformed packet header");
                    deliveries.push(Delivery::Framing(err));
                    if self.resync && self.decoder.skip_malformed_header() > 0 {
                        continue;
                    }
                    break;
                }
            }
        }
        deliveries
    }
}
