//! Session plumbing shared by both ends of a GPU command-remoting connection.
//!
//! Stream 0 carries JSON control traffic: the handshake that negotiates how
//! many command streams are open, then ping and shutdown. Command streams
//! carry [`gpuremote_wire::Message`] payloads. This crate owns the pieces
//! both sides need around that: the shared frame writer, reply correlation
//! with deadlines, the pending-callback table and re-entrancy detection.

pub mod callbacks;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod establish;
pub mod handshake;
pub mod outbound;
pub mod replies;

pub use callbacks::{CallbackHandler, CallbackTable};
pub use control::{
    ControlMessage, CONTROL_PING, CONTROL_PONG, CONTROL_SHUTDOWN_ACK, CONTROL_SHUTDOWN_REQUEST,
};
pub use dispatch::{in_dispatch, next_session_key, DispatchScope};
pub use error::{PeerError, Result};
pub use establish::{establish_client, establish_server, Established};
pub use handshake::{
    handshake_client, handshake_server, ClientHello, HandshakeConfig, HandshakeResult,
    ServerHello, MAX_STREAMS,
};
pub use outbound::Outbound;
pub use replies::{PendingReply, ReplyResult, ReplyTable};
