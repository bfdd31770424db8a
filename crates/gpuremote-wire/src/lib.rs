//! Wire parameter codec and message catalogue for GPU command remoting.
//!
//! Every command-stream payload is one [`Message`], encoded with the
//! [`Encode`]/[`Decode`] traits: little-endian scalars, length-prefixed
//! strings and sequences, a presence byte for optionals and a tag byte for
//! variants. Decoding is all-or-nothing.
//!
//! ```
//! use gpuremote_wire::{decode_message, encode_message, Command, GpuOp, Message};
//!
//! let message = Message::Post(Command::Gpu(GpuOp::Synchronize));
//! let payload = encode_message(&message);
//! assert_eq!(decode_message(&payload).unwrap(), message);
//! ```

#[macro_use]
mod macros;

pub mod codec;
pub mod error;
pub mod ids;
pub mod kind;
pub mod message;
pub mod ops;
pub mod types;

pub use codec::{from_bytes, to_bytes, Decode, Decoder, Encode, Encoder};
pub use error::{Result, WireError};
pub use ids::{CallbackId, Identifier, ObjectKind, RequestId};
pub use kind::ResourceKind;
pub use message::{
    decode_message, encode_message, CallbackOutcome, Command, FaultReport, Message, RemoteFault,
    ReplyValue,
};
pub use ops::{
    AdapterOp, BufferOp, CommandEncoderOp, CommonOp, DeviceOp, GpuOp, NoOp, ObjectOp, QueueOp,
    RenderPassOp, TextureOp,
};
