//! Client side of GPU command remoting.
//!
//! A [`Connection`] talks to the GPU host over one socket split into
//! command streams. Objects are created through typed [`Proxy`] handles:
//! each proxy owns an identifier the host resolves to a real object, and
//! releases it when dropped.
//!
//! ```no_run
//! use gpuremote_client::{Connection, ConnectionConfig};
//! use gpuremote_wire::types::{BufferDescriptor, BufferUsage, DeviceDescriptor};
//!
//! let conn = Connection::connect("/tmp/gpu.sock", ConnectionConfig::default())?;
//! let device = conn.create_device(1, &DeviceDescriptor::default())?;
//! let queue = device.create_queue()?;
//! let buffer = device.create_buffer(&BufferDescriptor {
//!     label: Some("staging".into()),
//!     size: 16,
//!     usage: BufferUsage::COPY_DST | BufferUsage::MAP_READ,
//!     mapped_at_creation: false,
//! })?;
//! queue.write_buffer(&buffer, 0, vec![7u8; 16])?;
//! assert_eq!(&buffer.read(0, 4)?[..], &[7, 7, 7, 7]);
//! # Ok::<(), gpuremote_client::ClientError>(())
//! ```

pub mod authority;
pub mod config;
pub mod connection;
pub mod error;
mod kinds;
pub mod proxy;
pub mod work_done;

pub use authority::IdentifierAuthority;
pub use config::ConnectionConfig;
pub use connection::{Connection, StreamFault};
pub use error::{ClientError, Result};
pub use gpuremote_wire::kind;
pub use proxy::Proxy;
pub use work_done::WorkDone;
