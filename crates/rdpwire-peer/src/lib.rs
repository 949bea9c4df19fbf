//! Request/reply correlation and event dispatch for remote debugging peers.
//!
//! A [`Protocol`] sits on a duplex byte stream. Outbound requests are
//! serialized to JSON, framed and written; every inbound payload is matched
//! to the oldest outstanding request. The wire carries no request ids, so
//! the peer must answer strictly in order. Payloads that arrive while no
//! request is outstanding are unsolicited events and go to listeners
//! registered with [`Protocol::on`].

#[cfg(feature = "async")]
pub mod async_io;
pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod json;
pub mod message;
pub mod notify;
pub mod pending;
pub mod protocol;

#[cfg(feature = "async")]
pub use async_io::AsyncInbound;
pub use config::ProtocolConfig;
pub use connector::{connect, connect_with_config, Connection};
pub use dispatch::{Delivery, Dispatcher};
pub use error::{PeerError, ProtocolFault, Result};
pub use message::{ActorRequest, Greeting, ROOT_ACTOR};
pub use notify::{Listeners, Notification, NotificationKind};
pub use pending::{PendingQueue, PendingReply, Slot};
pub use protocol::{InboundHandle, Protocol};
