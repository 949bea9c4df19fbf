use rdpwire_frame::FrameConfig;

const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Runtime configuration for a [`Protocol`](crate::Protocol).
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Payload limit and stream timeouts.
    pub frame: FrameConfig,
    /// Size of the buffer the inbound pump reads into.
    pub read_chunk_size: usize,
    /// Absorb the first inbound payload as the peer's greeting.
    ///
    /// A debugger server announces itself before any request is sent. With
    /// this set the greeting is consumed silently instead of surfacing as an
    /// event.
    pub expect_greeting: bool,
    /// Drop a malformed header and keep parsing instead of stalling.
    pub resync_on_malformed_header: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            expect_greeting: false,
            resync_on_malformed_header: false,
        }
    }
}

impl ProtocolConfig {
    pub fn with_greeting(mut self) -> Self {
        self.expect_greeting = true;
        self
    }

    pub fn with_resync(mut self) -> Self {
        self.resync_on_malformed_header = true;
        self
    }
}
