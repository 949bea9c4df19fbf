//! Length-prefixed JSON request/reply plumbing for remote debugging protocols.
//!
//! A debugger client talks to its server over one byte stream carrying
//! packets of the form `<byte length>:<JSON>`. Replies carry no request id;
//! they answer outstanding requests strictly in order, and anything that
//! arrives with nothing outstanding is an unsolicited event.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket streams
//! - [`frame`]: the `len:payload` packet codec, readers and writers
//! - [`peer`]: request correlation and event dispatch (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use rdpwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rdpwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use rdpwire_peer::*;
}
