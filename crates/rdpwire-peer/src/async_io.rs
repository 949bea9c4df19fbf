//! Attach a [`Protocol`] to tokio streams.
//!
//! The reader task feeds raw chunks exactly like the blocking pump. Writes
//! go through an unbounded channel to a writer task, so
//! [`Protocol::send_request`] never awaits and keeps its synchronous
//! signature.

use std::io::ErrorKind;

use bytes::Bytes;
use rdpwire_frame::FrameError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{ProtocolFault, Result};
use crate::notify::Notification;
use crate::protocol::{Outbound, Protocol, WeakProtocol};

/// Reader and writer tasks started by [`Protocol::attach_async`].
#[derive(Debug)]
pub struct AsyncInbound {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl AsyncInbound {
    /// Wait for the inbound stream to end. `Close` has been delivered when
    /// this returns.
    pub async fn closed(&mut self) {
        let _ = (&mut self.reader).await;
    }

    /// Stop both tasks without waiting for the stream to end.
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Protocol {
    /// Attach async stream halves. Must be called inside a tokio runtime.
    ///
    /// The writer task runs until [`Protocol::detach_outbound`] is called or
    /// every clone of the protocol is dropped.
    pub fn attach_async<R, W>(&self, inbound: R, outbound: W) -> Result<AsyncInbound>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        self.install_outbound(Outbound::Channel {
            tx,
            max_payload: self.config().frame.max_payload_size,
        })?;

        let writer = tokio::spawn(write_loop(self.downgrade(), outbound, rx));
        let reader = tokio::spawn(read_loop(self.clone(), inbound));
        Ok(AsyncInbound { reader, writer })
    }
}

async fn read_loop<R>(protocol: Protocol, mut inbound: R)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; protocol.config().read_chunk_size.max(1)];
    loop {
        match inbound.read(&mut chunk).await {
            Ok(0) => {
                debug!("inbound stream closed");
                protocol.emit(Notification::Close);
                return;
            }
            Ok(n) => protocol.feed(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(error = %err, "inbound stream failed");
                protocol.emit(Notification::Error(ProtocolFault::InputStream(err)));
                protocol.emit(Notification::Close);
                return;
            }
        }
    }
}

// Holds the protocol weakly; the sender lives inside it, so a strong
// reference would keep the channel open forever.
async fn write_loop<W>(
    protocol: WeakProtocol,
    mut outbound: W,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(packet) = rx.recv().await {
        let written = match outbound.write_all(&packet).await {
            Ok(()) => outbound.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            if let Some(protocol) = protocol.upgrade() {
                protocol.emit(Notification::Error(ProtocolFault::OutputStream(
                    FrameError::Io(err),
                )));
            }
        }
    }
    debug!("outbound channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures_util::{SinkExt, StreamExt};
    use rdpwire_frame::PacketCodec;
    use serde_json::{json, Value};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::config::ProtocolConfig;
    use crate::message::{ActorRequest, Greeting};
    use crate::notify::NotificationKind;

    #[tokio::test]
    async fn request_reply_over_duplex() {
        let (client, server) = tokio::io::duplex(256);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        let mut peer_in = FramedRead::new(server_read, PacketCodec::new());
        let mut peer_out = FramedWrite::new(server_write, PacketCodec::new());

        let protocol = Protocol::with_config(ProtocolConfig::default().with_greeting());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        protocol.on(NotificationKind::Event, move |note| {
            sink.lock().unwrap().push(note.as_event().cloned().unwrap());
        });
        let mut tasks = protocol.attach_async(client_read, client_write).unwrap();

        peer_out
            .send(serde_json::to_vec(&Greeting::root("test")).unwrap())
            .await
            .unwrap();

        let reply = protocol
            .request::<_, Value>(&ActorRequest::new("root", "getRoot"))
            .unwrap();

        let request: Value = serde_json::from_slice(&peer_in.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(request, json!({"to": "root", "type": "getRoot"}));

        peer_out.send(br#"{"from":"root","preferenceActor":"p1"}"#.to_vec()).await.unwrap();
        peer_out.send(br#"{"type":"newGlobal"}"#.to_vec()).await.unwrap();

        assert_eq!(
            reply.await.unwrap(),
            json!({"from": "root", "preferenceActor": "p1"})
        );

        drop(peer_out);
        drop(peer_in);
        tasks.closed().await;
        assert_eq!(*events.lock().unwrap(), vec![json!({"type": "newGlobal"})]);
        protocol.detach_outbound();
    }

    #[tokio::test]
    async fn oversized_request_is_output_error() {
        let (client, _server) = tokio::io::duplex(64);
        let (client_read, client_write) = tokio::io::split(client);
        let mut config = ProtocolConfig::default();
        config.frame.max_payload_size = 4;
        let protocol = Protocol::with_config(config);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        protocol.on(NotificationKind::Error, move |note| {
            sink.lock().unwrap().push(note.as_fault().unwrap().to_string());
        });
        let tasks = protocol.attach_async(client_read, client_write).unwrap();

        protocol.send_request(&json!({"to": "root"})).unwrap();

        assert_eq!(errors.lock().unwrap().len(), 1);
        assert_eq!(protocol.pending_len(), 1);
        tasks.abort();
    }
}
