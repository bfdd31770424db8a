//! Stream identifiers.
//!
//! Stream 0 carries connection control (handshake, ping, shutdown). Streams
//! `1..=n` carry command traffic; `n` is agreed during the handshake. Each
//! command stream is dispatched sequentially by the host, so every message
//! touching one object should travel on the same stream.

/// Identifies one ordered command stream within a connection.
pub type StreamId = u16;

/// Connection management (JSON control messages).
pub const CONTROL: StreamId = 0;

/// The stream used when the caller does not pick one.
pub const DEFAULT_STREAM: StreamId = 1;

/// Human-readable label for logs.
pub fn stream_label(id: StreamId) -> String {
    match id {
        CONTROL => "control".to_string(),
        n => format!("stream-{n}"),
    }
}

/// True if `id` is a command stream within the negotiated range `1..=streams`.
pub fn is_command_stream(id: StreamId, streams: u16) -> bool {
    id != CONTROL && id <= streams
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_is_never_a_command_stream() {
        assert!(!is_command_stream(CONTROL, u16::MAX));
    }

    #[test]
    fn command_streams_are_bounded_by_negotiation() {
        assert!(is_command_stream(DEFAULT_STREAM, 1));
        assert!(is_command_stream(4, 4));
        assert!(!is_command_stream(5, 4));
    }

    #[test]
    fn labels() {
        assert_eq!(stream_label(CONTROL), "control");
        assert_eq!(stream_label(3), "stream-3");
    }
}
