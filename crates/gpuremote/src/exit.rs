use std::fmt;
use std::io;

use gpuremote_client::ClientError;
use gpuremote_frame::FrameError;
use gpuremote_host::HostError;
use gpuremote_peer::PeerError;
use gpuremote_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other @ TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {other}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Wire(_) | PeerError::Json(_) | PeerError::HandshakeFailed(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PeerError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PeerError::UnsupportedStream(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PeerError::Disconnected(_) | PeerError::ShutdownFailed(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        PeerError::ReentrantRequest => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Transport(err) => transport_error(context, err),
        HostError::Frame(err) => frame_error(context, err),
        HostError::Peer(err) => peer_error(context, err),
        HostError::Spawn { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Peer(err) => peer_error(context, err),
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::UnsupportedStream(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Remote(_) | ClientError::Disconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ClientError::UnexpectedReply(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::ReentrantRequest => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gpuremote_wire::{Identifier, RemoteFault};

    use super::*;

    #[test]
    fn missing_socket_is_a_transport_error() {
        let err = TransportError::Connect {
            path: "/tmp/missing.sock".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn client_errors_map_to_their_codes() {
        assert_eq!(
            client_error("read", ClientError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        let fault = RemoteFault::UnresolvedIdentifier {
            id: Identifier::new(3).unwrap(),
        };
        assert_eq!(client_error("read", ClientError::Remote(fault)).code, FAILURE);
        assert_eq!(
            client_error("post", ClientError::UnsupportedStream(9)).code,
            USAGE
        );
    }

    #[test]
    fn oversized_frames_are_invalid_data() {
        let err = FrameError::PayloadTooLarge { size: 10, max: 1 };
        assert_eq!(frame_error("read", err).code, DATA_INVALID);
    }
}
