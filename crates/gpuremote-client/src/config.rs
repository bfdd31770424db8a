use std::time::Duration;

use gpuremote_frame::FrameConfig;
use gpuremote_peer::HandshakeConfig;

/// Client connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Command streams to ask for. The host may grant fewer. Default: 4.
    pub streams: u16,
    /// How long a blocking request waits for its reply. Default: 30s.
    pub reply_timeout: Duration,
    pub handshake: HandshakeConfig,
    /// Applies once the handshake has completed.
    pub frame: FrameConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            streams: 4,
            reply_timeout: Duration::from_secs(30),
            handshake: HandshakeConfig::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_streams(mut self, streams: u16) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.handshake = self.handshake.with_auth_token(token);
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}
