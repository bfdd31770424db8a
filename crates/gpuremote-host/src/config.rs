use gpuremote_frame::FrameConfig;
use gpuremote_peer::HandshakeConfig;

/// Host session configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Most command streams granted to one client. Default: 8.
    pub max_streams: u16,
    pub handshake: HandshakeConfig,
    /// Applies once the handshake has completed.
    pub frame: FrameConfig,
    /// Messages queued per stream before the reader waits for its
    /// dispatcher to catch up. Default: 256.
    pub queue_depth: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_streams: 8,
            handshake: HandshakeConfig::default(),
            frame: FrameConfig::default(),
            queue_depth: 256,
        }
    }
}

impl HostConfig {
    pub fn with_max_streams(mut self, max_streams: u16) -> Self {
        self.max_streams = max_streams;
        self
    }

    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.frame.max_payload_size = max_payload_size;
        self
    }
}
