use std::fmt;
use std::num::NonZeroU64;

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Result, WireError};

/// Names one remote object for the lifetime of a session.
///
/// Allocated by the client and never reused while registered. Zero is
/// reserved and never decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(NonZeroU64);

impl Identifier {
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for Identifier {
    fn from(raw: NonZeroU64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Encode for Identifier {
    fn encode(&self, enc: &mut Encoder) {
        enc.u64(self.get());
    }
}

impl Decode for Identifier {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Identifier::new(dec.u64()?).ok_or(WireError::ZeroIdentifier)
    }
}

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl Encode for $name {
            fn encode(&self, enc: &mut Encoder) {
                enc.u64(self.0);
            }
        }

        impl Decode for $name {
            fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
                dec.u64().map(Self)
            }
        }
    };
}

counter_id!(
    /// Correlates a blocking request with its reply.
    RequestId,
    "req"
);

counter_id!(
    /// Names one pending completion callback.
    CallbackId,
    "cb"
);

wire_enum! {
    /// Kind of a registered object. Every operation names the kind it
    /// expects its target and arguments to have.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ObjectKind {
        Device = 0,
        Queue = 1,
        Buffer = 2,
        Texture = 3,
        TextureView = 4,
        CommandEncoder = 5,
        CommandBuffer = 6,
        RenderPassEncoder = 7,
        RenderPipeline = 8,
        BindGroup = 9,
        RenderBundle = 10,
        QuerySet = 11,
        Adapter = 12,
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};

    #[test]
    fn zero_identifier_never_decodes() {
        assert_eq!(Identifier::new(0), None);
        assert_eq!(
            from_bytes::<Identifier>(&0u64.to_le_bytes()),
            Err(WireError::ZeroIdentifier)
        );
    }

    #[test]
    fn identifier_is_eight_le_bytes() {
        let id = Identifier::new(0x0102).unwrap();
        assert_eq!(&to_bytes(&id)[..], &[2, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(id.to_string(), "#258");
    }

    #[test]
    fn every_kind_decodes_from_its_tag() {
        for kind in ObjectKind::ALL {
            assert_eq!(from_bytes::<ObjectKind>(&[*kind as u8]), Ok(*kind));
        }
        assert!(matches!(
            from_bytes::<ObjectKind>(&[13]),
            Err(WireError::InvalidTag { ty: "ObjectKind", tag: 13 })
        ));
    }
}
