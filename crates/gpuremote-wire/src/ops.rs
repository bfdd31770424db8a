//! Per-kind operation tables.

use bytes::Bytes;

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Result, WireError};
use crate::ids::{CallbackId, Identifier, ObjectKind};
use crate::types::{
    BindGroupDescriptor, BufferDescriptor, Color, CommandEncoderDescriptor, DeviceDescriptor,
    Extent3D, ImageCopyExternalImage, ImageCopyTexture, ImageCopyTextureTagged, ImageDataLayout,
    IndexFormat, QuerySetDescriptor, RenderBundleDescriptor, RenderPassDescriptor,
    RenderPipelineDescriptor, RequestAdapterOptions, TextureDescriptor, TextureViewDescriptor,
};

wire_variants! {
    /// Operations addressed to the connection itself rather than an object.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GpuOp {
        0 => CreateDevice { device: Identifier, descriptor: DeviceDescriptor },
        /// Barrier: as a request, replies once every earlier message on the
        /// same stream has been dispatched.
        1 => Synchronize,
        2 => RequestAdapter { adapter: Identifier, options: RequestAdapterOptions },
    }
}

wire_variants! {
    /// Operations every object accepts.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CommonOp {
        0 => SetLabel { label: String },
        /// Drop the host object. Pending completions it owns are cancelled.
        1 => Release,
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AdapterOp {
        0 => RequestDevice { device: Identifier, descriptor: DeviceDescriptor },
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum DeviceOp {
        0 => CreateQueue { queue: Identifier },
        1 => CreateBuffer { buffer: Identifier, descriptor: BufferDescriptor },
        2 => CreateTexture { texture: Identifier, descriptor: TextureDescriptor },
        3 => CreateQuerySet { query_set: Identifier, descriptor: QuerySetDescriptor },
        4 => CreateRenderPipeline { pipeline: Identifier, descriptor: RenderPipelineDescriptor },
        5 => CreateBindGroup { bind_group: Identifier, descriptor: BindGroupDescriptor },
        6 => CreateCommandEncoder { encoder: Identifier, descriptor: CommandEncoderDescriptor },
        7 => CreateRenderBundle { bundle: Identifier, descriptor: RenderBundleDescriptor },
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum QueueOp {
        /// All command buffers resolve or none are submitted.
        0 => Submit { command_buffers: Vec<Identifier> },
        1 => OnSubmittedWorkDone { callback: CallbackId },
        2 => WriteBuffer { buffer: Identifier, offset: u64, data: Bytes },
        3 => WriteTexture {
            destination: ImageCopyTexture,
            data: Bytes,
            layout: ImageDataLayout,
            size: Extent3D,
        },
        4 => CopyExternalImageToTexture {
            source: ImageCopyExternalImage,
            destination: ImageCopyTextureTagged,
            copy_size: Extent3D,
        },
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BufferOp {
        /// Request only; replies with the bytes read.
        0 => Read { offset: u64, size: u64 },
        1 => Destroy,
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TextureOp {
        0 => CreateView { view: Identifier, descriptor: TextureViewDescriptor },
        1 => Destroy,
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum CommandEncoderOp {
        0 => BeginRenderPass { pass: Identifier, descriptor: RenderPassDescriptor },
        1 => CopyBufferToBuffer {
            source: Identifier,
            source_offset: u64,
            destination: Identifier,
            destination_offset: u64,
            size: u64,
        },
        2 => Finish { command_buffer: Identifier, label: Option<String> },
    }
}

wire_variants! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum RenderPassOp {
        0 => SetPipeline { pipeline: Identifier },
        1 => SetIndexBuffer {
            buffer: Identifier,
            format: IndexFormat,
            offset: u64,
            size: Option<u64>,
        },
        2 => SetVertexBuffer { slot: u32, buffer: Identifier, offset: u64, size: Option<u64> },
        3 => Draw {
            vertex_count: u32,
            instance_count: u32,
            first_vertex: u32,
            first_instance: u32,
        },
        4 => DrawIndexed {
            index_count: u32,
            instance_count: u32,
            first_index: u32,
            base_vertex: i32,
            first_instance: u32,
        },
        5 => DrawIndirect { indirect_buffer: Identifier, indirect_offset: u64 },
        6 => DrawIndexedIndirect { indirect_buffer: Identifier, indirect_offset: u64 },
        7 => SetBindGroup { index: u32, bind_group: Identifier, dynamic_offsets: Option<Vec<u32>> },
        8 => PushDebugGroup { label: String },
        9 => PopDebugGroup,
        10 => InsertDebugMarker { label: String },
        11 => SetViewport {
            x: f32,
            y: f32,
            width: f32,
            height: f32,
            min_depth: f32,
            max_depth: f32,
        },
        12 => SetScissorRect { x: u32, y: u32, width: u32, height: u32 },
        13 => SetBlendConstant { color: Color },
        14 => SetStencilReference { reference: u32 },
        15 => BeginOcclusionQuery { query_index: u32 },
        16 => EndOcclusionQuery,
        /// An absent query set means the pass's occlusion query set.
        17 => BeginPipelineStatisticsQuery { query_set: Option<Identifier>, query_index: u32 },
        18 => EndPipelineStatisticsQuery,
        /// All bundles resolve or none are executed.
        19 => ExecuteBundles { bundles: Vec<Identifier> },
        20 => EndPass,
    }
}

/// Operations for kinds that accept only [`CommonOp`]. Uninhabited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOp {}

impl NoOp {
    pub const fn name(&self) -> &'static str {
        match *self {}
    }
}

impl Encode for NoOp {
    fn encode(&self, _enc: &mut Encoder) {
        match *self {}
    }
}

impl Decode for NoOp {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Err(WireError::InvalidTag {
            ty: "NoOp",
            tag: dec.u8()?,
        })
    }
}

/// An operation on a target object, tagged by the kind it applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOp {
    Common(CommonOp),
    Device(DeviceOp),
    Queue(QueueOp),
    Buffer(BufferOp),
    Texture(TextureOp),
    CommandEncoder(CommandEncoderOp),
    RenderPass(RenderPassOp),
    Adapter(AdapterOp),
}

impl ObjectOp {
    /// The kind the target must have. `None` for common operations, which
    /// every kind accepts.
    pub const fn target_kind(&self) -> Option<ObjectKind> {
        match self {
            ObjectOp::Common(_) => None,
            ObjectOp::Device(_) => Some(ObjectKind::Device),
            ObjectOp::Queue(_) => Some(ObjectKind::Queue),
            ObjectOp::Buffer(_) => Some(ObjectKind::Buffer),
            ObjectOp::Texture(_) => Some(ObjectKind::Texture),
            ObjectOp::CommandEncoder(_) => Some(ObjectKind::CommandEncoder),
            ObjectOp::RenderPass(_) => Some(ObjectKind::RenderPassEncoder),
            ObjectOp::Adapter(_) => Some(ObjectKind::Adapter),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            ObjectOp::Common(op) => op.name(),
            ObjectOp::Device(op) => op.name(),
            ObjectOp::Queue(op) => op.name(),
            ObjectOp::Buffer(op) => op.name(),
            ObjectOp::Texture(op) => op.name(),
            ObjectOp::CommandEncoder(op) => op.name(),
            ObjectOp::RenderPass(op) => op.name(),
            ObjectOp::Adapter(op) => op.name(),
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, ObjectOp::Common(CommonOp::Release))
    }
}

impl Encode for ObjectOp {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            ObjectOp::Common(op) => {
                enc.u8(0);
                op.encode(enc);
            }
            ObjectOp::Device(op) => {
                enc.u8(1);
                op.encode(enc);
            }
            ObjectOp::Queue(op) => {
                enc.u8(2);
                op.encode(enc);
            }
            ObjectOp::Buffer(op) => {
                enc.u8(3);
                op.encode(enc);
            }
            ObjectOp::Texture(op) => {
                enc.u8(4);
                op.encode(enc);
            }
            ObjectOp::CommandEncoder(op) => {
                enc.u8(5);
                op.encode(enc);
            }
            ObjectOp::RenderPass(op) => {
                enc.u8(6);
                op.encode(enc);
            }
            ObjectOp::Adapter(op) => {
                enc.u8(7);
                op.encode(enc);
            }
        }
    }
}

impl Decode for ObjectOp {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(match dec.u8()? {
            0 => ObjectOp::Common(CommonOp::decode(dec)?),
            1 => ObjectOp::Device(DeviceOp::decode(dec)?),
            2 => ObjectOp::Queue(QueueOp::decode(dec)?),
            3 => ObjectOp::Buffer(BufferOp::decode(dec)?),
            4 => ObjectOp::Texture(TextureOp::decode(dec)?),
            5 => ObjectOp::CommandEncoder(CommandEncoderOp::decode(dec)?),
            6 => ObjectOp::RenderPass(RenderPassOp::decode(dec)?),
            7 => ObjectOp::Adapter(AdapterOp::decode(dec)?),
            tag => {
                return Err(WireError::InvalidTag {
                    ty: "ObjectOp",
                    tag,
                })
            }
        })
    }
}
