use std::net::Shutdown;

use rdpwire_transport::{Endpoint, RemoteStream};
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::error::{PeerError, Result};
use crate::protocol::{InboundHandle, Protocol};

/// A protocol attached to a socket connection.
#[derive(Debug)]
pub struct Connection {
    protocol: Protocol,
    inbound: InboundHandle,
    stream: RemoteStream,
}

impl Connection {
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Shut the socket down and wait for the inbound pump to deliver `Close`.
    ///
    /// The socket is closed even when a listener panicked on the pump
    /// thread; that panic is reported as [`PeerError::InboundPanicked`].
    pub fn close(self) -> Result<()> {
        self.protocol.detach_outbound();
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            // Already closed by the peer.
            debug!(error = %err, "socket shutdown failed");
        }
        join_inbound(self.inbound)
    }

    /// Wait until the peer closes the connection.
    pub fn wait_closed(self) -> Result<()> {
        join_inbound(self.inbound)
    }
}

fn join_inbound(inbound: InboundHandle) -> Result<()> {
    inbound.join().map_err(|_| PeerError::InboundPanicked)
}

impl Protocol {
    /// Connect to `endpoint` and attach the socket to this protocol.
    ///
    /// Listeners registered before this call see every notification,
    /// including the greeting when it is not absorbed.
    pub fn connect(&self, endpoint: &Endpoint) -> Result<Connection> {
        let stream = endpoint.connect()?;
        stream.set_write_timeout(self.config().frame.write_timeout)?;
        let inbound = stream.try_clone()?;
        let outbound = stream.try_clone()?;
        debug!(%endpoint, transport = stream.transport_name(), "connected");

        let handle = self.attach(inbound, outbound)?;
        Ok(Connection {
            protocol: self.clone(),
            inbound: handle,
            stream,
        })
    }
}

/// Connect to `endpoint` with default configuration.
pub fn connect(endpoint: &Endpoint) -> Result<Connection> {
    connect_with_config(endpoint, ProtocolConfig::default())
}

/// Connect to `endpoint` with explicit configuration.
pub fn connect_with_config(endpoint: &Endpoint, config: ProtocolConfig) -> Result<Connection> {
    Protocol::with_config(config).connect(endpoint)
}
