/// Errors that can occur while accepting or running host sessions.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("transport error: {0}")]
    Transport(#[from] gpuremote_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] gpuremote_frame::FrameError),

    /// Handshake or session plumbing failed.
    #[error("session error: {0}")]
    Peer(#[from] gpuremote_peer::PeerError),

    /// A session worker thread could not be started.
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, HostError>;
