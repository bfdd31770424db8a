//! Length-prefixed frames carrying independent command streams.
//!
//! Every frame on the wire is:
//! - a 2-byte magic number ("GR") for stream synchronization
//! - a 4-byte little-endian payload length
//! - a 2-byte little-endian stream id
//!
//! Frames of one stream are delivered in the order they were written. There is
//! no ordering guarantee *between* streams once the receiver fans them out.

pub mod codec;
pub mod error;
pub mod reader;
pub mod stream;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use stream::{is_command_stream, stream_label, StreamId, CONTROL, DEFAULT_STREAM};
pub use writer::FrameWriter;
