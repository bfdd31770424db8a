//! Cross-process GPU command remoting.
//!
//! A sandboxed content process drives a GPU it cannot touch: every call on a
//! client [`client::Proxy`] is serialized onto a command stream and replayed
//! by the host process against the real object it names.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain sockets and stream pairs
//! - [`frame`]: length-prefixed frames carrying independent command streams
//! - [`wire`]: parameter codec, identifiers and the message catalogue
//! - [`peer`]: handshake, control stream, reply and callback tables
//! - [`host`]: object heap, dispatch and the in-memory backend (behind `host`)
//! - [`client`]: connections and typed proxies (behind `client`)

/// Re-export transport types.
pub mod transport {
    pub use gpuremote_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gpuremote_frame::*;
}

/// Re-export wire types.
pub mod wire {
    pub use gpuremote_wire::*;
}

/// Re-export peer types.
pub mod peer {
    pub use gpuremote_peer::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use gpuremote_host::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use gpuremote_client::*;
}
