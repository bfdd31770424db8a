//! Ordered byte channel between a content process and the GPU host process.
//!
//! This is the lowest layer of gpuremote. It knows nothing about frames,
//! streams or commands; it only moves bytes in order over a connected
//! Unix stream socket:
//! - [`IpcStream`]: a connected, full-duplex byte stream
//! - [`GpuSocket`]: the host-side listening socket and client-side connector

pub mod error;

#[cfg(unix)]
pub mod socket;
#[cfg(unix)]
pub mod stream;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use socket::GpuSocket;
#[cfg(unix)]
pub use stream::{IpcStream, PeerCredentials};
