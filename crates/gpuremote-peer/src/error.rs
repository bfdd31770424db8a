use gpuremote_frame::StreamId;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("transport error: {0}")]
    Transport(#[from] gpuremote_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] gpuremote_frame::FrameError),

    /// A command-stream payload failed to decode.
    #[error("wire error: {0}")]
    Wire(#[from] gpuremote_wire::WireError),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The stream was not negotiated during the handshake.
    #[error("stream {0} not negotiated")]
    UnsupportedStream(StreamId),

    /// JSON error on the control stream.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No reply arrived before the deadline. The outcome on the other side
    /// is unknown: the operation may or may not have been applied.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A blocking request was issued from the thread that delivers this
    /// connection's callbacks, which would deadlock.
    #[error("blocking request issued from a dispatch context")]
    ReentrantRequest,

    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),
}

pub type Result<T> = std::result::Result<T, PeerError>;
