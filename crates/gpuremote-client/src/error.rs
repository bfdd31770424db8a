use std::time::Duration;

use gpuremote_frame::StreamId;
use gpuremote_peer::PeerError;
use gpuremote_wire::RemoteFault;

/// Errors surfaced to client code.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] gpuremote_transport::TransportError),

    /// Handshake, framing or control-stream failure.
    #[error("session error: {0}")]
    Peer(PeerError),

    /// The host refused or failed the operation.
    #[error("remote fault: {0}")]
    Remote(#[from] RemoteFault),

    /// No reply before the deadline. The host may or may not have applied
    /// the operation; nothing is rolled back.
    #[error("no reply within {0:?}; outcome unknown")]
    Timeout(Duration),

    #[error("connection closed: {0}")]
    Disconnected(String),

    /// A blocking call was made from a callback of the same connection.
    #[error("blocking call from a callback of the same connection")]
    ReentrantRequest,

    #[error("stream {0} was not negotiated")]
    UnsupportedStream(StreamId),

    /// The reply did not have the shape the operation expects.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl From<PeerError> for ClientError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Timeout(after) => ClientError::Timeout(after),
            PeerError::Disconnected(reason) => ClientError::Disconnected(reason),
            PeerError::ReentrantRequest => ClientError::ReentrantRequest,
            PeerError::UnsupportedStream(stream) => ClientError::UnsupportedStream(stream),
            PeerError::Transport(err) => ClientError::Transport(err),
            other => ClientError::Peer(other),
        }
    }
}

impl From<gpuremote_frame::FrameError> for ClientError {
    fn from(err: gpuremote_frame::FrameError) -> Self {
        ClientError::Peer(PeerError::Frame(err))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
