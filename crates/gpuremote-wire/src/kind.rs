//! Marker types for each resource kind.
//!
//! A marker ties an [`ObjectKind`] to the operation enum its objects accept,
//! so client proxies and host dispatch are written once, generically.

use std::fmt;

use crate::codec::{Decode, Encode};
use crate::ids::ObjectKind;
use crate::ops::{
    AdapterOp, BufferOp, CommandEncoderOp, DeviceOp, NoOp, ObjectOp, QueueOp, RenderPassOp,
    TextureOp,
};

pub trait ResourceKind: Send + Sync + 'static {
    const KIND: ObjectKind;

    /// Kind-specific operations. [`NoOp`] for kinds that only take the
    /// common operations.
    type Op: Encode + Decode + fmt::Debug + Send + 'static;

    fn wrap(op: Self::Op) -> ObjectOp;
}

macro_rules! kind_marker {
    ($(#[$meta:meta])* $marker:ident => $op:ty, $wrap:path) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $marker {}

        impl ResourceKind for $marker {
            const KIND: ObjectKind = ObjectKind::$marker;
            type Op = $op;

            fn wrap(op: $op) -> ObjectOp {
                $wrap(op)
            }
        }
    };
    ($(#[$meta:meta])* $marker:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $marker {}

        impl ResourceKind for $marker {
            const KIND: ObjectKind = ObjectKind::$marker;
            type Op = NoOp;

            fn wrap(op: NoOp) -> ObjectOp {
                match op {}
            }
        }
    };
}

kind_marker!(Adapter => AdapterOp, ObjectOp::Adapter);
kind_marker!(Device => DeviceOp, ObjectOp::Device);
kind_marker!(Queue => QueueOp, ObjectOp::Queue);
kind_marker!(Buffer => BufferOp, ObjectOp::Buffer);
kind_marker!(Texture => TextureOp, ObjectOp::Texture);
kind_marker!(CommandEncoder => CommandEncoderOp, ObjectOp::CommandEncoder);
kind_marker!(RenderPassEncoder => RenderPassOp, ObjectOp::RenderPass);
kind_marker!(TextureView);
kind_marker!(CommandBuffer);
kind_marker!(RenderPipeline);
kind_marker!(BindGroup);
kind_marker!(RenderBundle);
kind_marker!(QuerySet);
