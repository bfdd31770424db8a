/// Errors raised while framing or unframing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header does not start with the "GR" magic.
    #[error("invalid frame magic (expected 0x4752 \"GR\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// EOF, either cleanly between frames or in the middle of one.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for read timeouts surfaced by a socket with `SO_RCVTIMEO` set.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

impl From<gpuremote_transport::TransportError> for FrameError {
    fn from(err: gpuremote_transport::TransportError) -> Self {
        match err {
            gpuremote_transport::TransportError::Io(io)
            | gpuremote_transport::TransportError::Accept(io)
            | gpuremote_transport::TransportError::Bind { source: io, .. }
            | gpuremote_transport::TransportError::Connect { source: io, .. } => FrameError::Io(io),
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
