use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use rdpwire_frame::{FrameError, PacketWriter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::ProtocolConfig;
use crate::dispatch::Dispatcher;
use crate::error::{PeerError, ProtocolFault, Result};
use crate::json::encode_request;
use crate::notify::{self, Listeners, Notification, NotificationKind};
use crate::pending::{PendingReply, Slot};

type BoxedWrite = Box<dyn Write + Send>;

/// Where framed requests go.
pub(crate) enum Outbound {
    Blocking(PacketWriter<BoxedWrite>),
    #[cfg(feature = "async")]
    Channel {
        tx: tokio::sync::mpsc::UnboundedSender<bytes::Bytes>,
        max_payload: usize,
    },
}

impl Outbound {
    fn send(&mut self, payload: &[u8]) -> std::result::Result<(), FrameError> {
        match self {
            Outbound::Blocking(writer) => writer.send(payload),
            #[cfg(feature = "async")]
            Outbound::Channel { tx, max_payload } => {
                if payload.len() > *max_payload {
                    return Err(FrameError::PayloadTooLarge {
                        size: payload.len(),
                        max: *max_payload,
                    });
                }
                let mut packet = bytes::BytesMut::new();
                rdpwire_frame::encode_packet(payload, &mut packet);
                tx.send(packet.freeze())
                    .map_err(|_| FrameError::ConnectionClosed)
            }
        }
    }
}

struct Shared {
    config: ProtocolConfig,
    // Lock order: `outbound` before `dispatcher`. Listeners are never held
    // while another lock is taken.
    outbound: Mutex<Option<Outbound>>,
    dispatcher: Mutex<Dispatcher>,
    listeners: Mutex<Listeners>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A request/reply client over one duplex byte stream.
///
/// Cloning is cheap and every clone drives the same connection. Requests may
/// be issued from any thread, including from inside reply callbacks and
/// listeners.
#[derive(Clone)]
pub struct Protocol {
    shared: Arc<Shared>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("attached", &self.is_attached())
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl Protocol {
    /// Create a protocol with default configuration and no stream attached.
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    pub fn with_config(config: ProtocolConfig) -> Self {
        let dispatcher = Dispatcher::new(&config);
        Self {
            shared: Arc::new(Shared {
                config,
                outbound: Mutex::new(None),
                dispatcher: Mutex::new(dispatcher),
                listeners: Mutex::new(Listeners::new()),
            }),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.shared.config
    }

    #[cfg(feature = "async")]
    pub(crate) fn downgrade(&self) -> WeakProtocol {
        WeakProtocol {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register a listener. Listeners for one kind run in registration order.
    pub fn on<F>(&self, kind: NotificationKind, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners).on(kind, handler);
    }

    /// Attach a duplex stream: `outbound` receives requests and a background
    /// thread pumps `inbound` into [`Protocol::feed`] until it ends.
    pub fn attach<R, W>(&self, inbound: R, outbound: W) -> Result<InboundHandle>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        self.set_outbound(outbound)?;

        let protocol = self.clone();
        let handle = thread::Builder::new()
            .name("rdpwire-inbound".to_string())
            .spawn(move || protocol.pump(inbound))
            .map_err(|err| {
                self.detach_outbound();
                PeerError::Spawn(err)
            })?;
        Ok(InboundHandle { handle })
    }

    /// Install the outbound stream without starting an inbound pump.
    ///
    /// Use this with [`Protocol::feed`] when inbound bytes arrive from
    /// elsewhere.
    pub fn set_outbound<W>(&self, outbound: W) -> Result<()>
    where
        W: Write + Send + 'static,
    {
        let writer = PacketWriter::with_config(
            Box::new(outbound) as BoxedWrite,
            self.shared.config.frame.clone(),
        );
        self.install_outbound(Outbound::Blocking(writer))
    }

    pub(crate) fn install_outbound(&self, outbound: Outbound) -> Result<()> {
        let mut slot = lock(&self.shared.outbound);
        if slot.is_some() {
            return Err(PeerError::AlreadyAttached);
        }
        *slot = Some(outbound);
        Ok(())
    }

    /// Drop the outbound stream. Later requests are queued but not written.
    pub fn detach_outbound(&self) {
        if lock(&self.shared.outbound).take().is_some() {
            debug!("outbound stream detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared.outbound).is_some()
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        lock(&self.shared.dispatcher).pending_len()
    }

    /// Process one chunk of inbound bytes.
    ///
    /// Replies, events and faults completed by this chunk are delivered on
    /// the calling thread before this returns.
    pub fn feed(&self, chunk: &[u8]) {
        let deliveries = lock(&self.shared.dispatcher).feed(chunk);
        for delivery in deliveries {
            delivery.deliver(chunk, &mut |note| self.emit(note));
        }
    }

    /// Send a request whose reply is validated and then dropped.
    pub fn send_request<Req>(&self, request: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.submit(request, Slot::Discard)
    }

    /// Send a request and hand the decoded reply to `on_reply`.
    ///
    /// `on_reply` runs on whichever thread feeds the reply in. It is not
    /// called if the reply does not decode as `T`; an `Error` notification
    /// is emitted instead.
    pub fn send_request_with<Req, T, F>(&self, request: &Req, on_reply: F) -> Result<()>
    where
        Req: Serialize + ?Sized,
        T: DeserializeOwned,
        F: FnOnce(T) + Send + 'static,
    {
        self.submit(request, Slot::callback(on_reply))
    }

    /// Send a request and get a future for its decoded reply.
    pub fn request<Req, T>(&self, request: &Req) -> Result<PendingReply<T>>
    where
        Req: Serialize + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        let (slot, reply) = Slot::reply();
        self.submit(request, slot)?;
        Ok(reply)
    }

    /// Queue `slot` and write the request while holding the outbound lock,
    /// so slot order always matches wire order.
    ///
    /// Serialization failures are returned before anything is queued. Write
    /// failures leave the slot queued and are reported to `Error` listeners.
    fn submit<Req>(&self, request: &Req, slot: Slot) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        let payload = encode_request(request)?;

        let failure = {
            let mut outbound = lock(&self.shared.outbound);
            lock(&self.shared.dispatcher).push(slot);
            match outbound.as_mut() {
                Some(out) => out.send(&payload).err(),
                None => {
                    trace!(len = payload.len(), "no outbound stream, request not written");
                    None
                }
            }
        };

        if let Some(err) = failure {
            warn!(error = %err, "failed to write request");
            self.emit(Notification::Error(ProtocolFault::OutputStream(err)));
        }
        Ok(())
    }

    /// Deliver `note` to the listeners registered for its kind.
    pub(crate) fn emit(&self, note: Notification) {
        let handlers = lock(&self.shared.listeners).snapshot(note.kind());
        if notify::invoke(&handlers, &note) == 0 {
            if let Notification::Error(fault) = &note {
                warn!(error = %fault, "protocol error with no listener");
            }
        }
    }

    fn pump<R: Read>(&self, mut inbound: R) {
        let mut chunk = vec![0u8; self.shared.config.read_chunk_size.max(1)];
        loop {
            match inbound.read(&mut chunk) {
                Ok(0) => {
                    debug!("inbound stream closed");
                    self.emit(Notification::Close);
                    return;
                }
                Ok(n) => self.feed(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(error = %err, "inbound stream failed");
                    self.emit(Notification::Error(ProtocolFault::InputStream(err)));
                    self.emit(Notification::Close);
                    return;
                }
            }
        }
    }
}

#[cfg(feature = "async")]
pub(crate) struct WeakProtocol {
    shared: std::sync::Weak<Shared>,
}

#[cfg(feature = "async")]
impl WeakProtocol {
    pub(crate) fn upgrade(&self) -> Option<Protocol> {
        self.shared.upgrade().map(|shared| Protocol { shared })
    }
}

/// Handle to the background thread started by [`Protocol::attach`].
#[derive(Debug)]
pub struct InboundHandle {
    handle: JoinHandle<()>,
}

impl InboundHandle {
    /// Wait for the inbound stream to end.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
