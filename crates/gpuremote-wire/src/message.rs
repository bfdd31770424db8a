//! The envelope every command-stream payload is wrapped in.

use bytes::Bytes;

use crate::codec::{self, Decode, Decoder, Encode, Encoder};
use crate::error::{Result, WireError};
use crate::ids::{CallbackId, Identifier, ObjectKind, RequestId};
use crate::ops::{GpuOp, ObjectOp};

/// A unit of work for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Gpu(GpuOp),
    Object { target: Identifier, op: ObjectOp },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Gpu(op) => op.name(),
            Command::Object { op, .. } => op.name(),
        }
    }

    pub const fn target(&self) -> Option<Identifier> {
        match self {
            Command::Gpu(_) => None,
            Command::Object { target, .. } => Some(*target),
        }
    }
}

impl Encode for Command {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Command::Gpu(op) => {
                enc.u8(0);
                op.encode(enc);
            }
            Command::Object { target, op } => {
                enc.u8(1);
                target.encode(enc);
                op.encode(enc);
            }
        }
    }
}

impl Decode for Command {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.u8()? {
            0 => GpuOp::decode(dec).map(Command::Gpu),
            1 => {
                let target = Identifier::decode(dec)?;
                let op = ObjectOp::decode(dec)?;
                Ok(Command::Object { target, op })
            }
            tag => Err(WireError::InvalidTag { ty: "Command", tag }),
        }
    }
}

wire_variants! {
    /// Why the host refused or failed an operation.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum RemoteFault {
        #[error("unresolved identifier {id}")]
        0 => UnresolvedIdentifier { id: Identifier },

        #[error("identifier {id} is a {found}, expected a {expected}")]
        1 => KindMismatch { id: Identifier, expected: ObjectKind, found: ObjectKind },

        #[error("identifier {id} is already registered")]
        2 => DuplicateIdentifier { id: Identifier },

        /// The backend rejected the operation.
        #[error("backend error: {message}")]
        3 => Backend { message: String },

        #[error("protocol error: {message}")]
        4 => Protocol { message: String },
    }
}

impl RemoteFault {
    pub fn backend(message: impl Into<String>) -> Self {
        RemoteFault::Backend {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        RemoteFault::Protocol {
            message: message.into(),
        }
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ReplyValue {
        0 => Unit,
        1 => Data { bytes: Bytes },
    }
}

wire_variants! {
    /// How a pending callback was fulfilled. Each callback receives exactly
    /// one outcome.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CallbackOutcome {
        0 => Completed,
        /// The owning object or the session went away first.
        1 => Cancelled,
        2 => Failed { message: String },
    }
}

wire_struct! {
    /// Host notice that a posted command was aborted.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FaultReport {
        pub target: Option<Identifier>,
        pub operation: String,
        pub fault: RemoteFault,
    }
}

/// Everything that travels on a command stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Fire-and-forget.
    Post(Command),
    Request {
        request: RequestId,
        command: Command,
    },
    Reply {
        request: RequestId,
        result: std::result::Result<ReplyValue, RemoteFault>,
    },
    Callback {
        callback: CallbackId,
        outcome: CallbackOutcome,
    },
    Fault(FaultReport),
}

impl Message {
    pub const fn name(&self) -> &'static str {
        match self {
            Message::Post(_) => "post",
            Message::Request { .. } => "request",
            Message::Reply { .. } => "reply",
            Message::Callback { .. } => "callback",
            Message::Fault(_) => "fault",
        }
    }
}

impl Encode for Message {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Message::Post(command) => {
                enc.u8(0);
                command.encode(enc);
            }
            Message::Request { request, command } => {
                enc.u8(1);
                request.encode(enc);
                command.encode(enc);
            }
            Message::Reply { request, result } => {
                enc.u8(2);
                request.encode(enc);
                result.encode(enc);
            }
            Message::Callback { callback, outcome } => {
                enc.u8(3);
                callback.encode(enc);
                outcome.encode(enc);
            }
            Message::Fault(report) => {
                enc.u8(4);
                report.encode(enc);
            }
        }
    }
}

impl Decode for Message {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.u8()? {
            0 => Command::decode(dec).map(Message::Post),
            1 => {
                let request = RequestId::decode(dec)?;
                let command = Command::decode(dec)?;
                Ok(Message::Request { request, command })
            }
            2 => {
                let request = RequestId::decode(dec)?;
                let result = std::result::Result::<ReplyValue, RemoteFault>::decode(dec)?;
                Ok(Message::Reply { request, result })
            }
            3 => {
                let callback = CallbackId::decode(dec)?;
                let outcome = CallbackOutcome::decode(dec)?;
                Ok(Message::Callback { callback, outcome })
            }
            4 => FaultReport::decode(dec).map(Message::Fault),
            tag => Err(WireError::InvalidTag { ty: "Message", tag }),
        }
    }
}

/// Encode one message as a frame payload.
pub fn encode_message(message: &Message) -> Bytes {
    codec::to_bytes(message)
}

/// Decode one frame payload. The payload must hold exactly one message.
pub fn decode_message(payload: &[u8]) -> Result<Message> {
    codec::from_bytes(payload)
}
