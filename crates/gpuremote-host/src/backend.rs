//! The seam between remote dispatch and the native graphics implementation.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use gpuremote_wire::types::{
    BindGroupDescriptor, BufferDescriptor, CommandEncoderDescriptor, DeviceDescriptor, Extent3D,
    ImageCopyExternalImage, ImageCopyTexture, ImageCopyTextureTagged, ImageDataLayout,
    QuerySetDescriptor, RenderBundleDescriptor, RenderPassDescriptor, RenderPipelineDescriptor,
    RequestAdapterOptions, TextureDescriptor, TextureViewDescriptor,
};
use gpuremote_wire::{Identifier, ObjectKind, RemoteFault, RenderPassOp};

use crate::completion::Completion;

/// A backend's own name for one of its resources. Opaque to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackingHandle(pub u64);

impl fmt::Display for BackingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// An operation the backend could not perform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl From<BackendError> for RemoteFault {
    fn from(err: BackendError) -> Self {
        RemoteFault::backend(err.0)
    }
}

/// Backing handles for every identifier an operation's arguments reference.
///
/// Built by the host before the backend is called; an operation whose
/// arguments do not all resolve never reaches the backend.
#[derive(Debug, Clone, Default)]
pub struct Handles(HashMap<Identifier, BackingHandle>);

impl Handles {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: Identifier, handle: BackingHandle) {
        self.0.insert(id, handle);
    }

    pub fn get(&self, id: Identifier) -> Option<BackingHandle> {
        self.0.get(&id).copied()
    }

    /// Like [`Handles::get`], for backends that want an error instead.
    pub fn require(&self, id: Identifier) -> BackendResult<BackingHandle> {
        self.get(id)
            .ok_or_else(|| BackendError(format!("identifier {id} was not resolved")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What to create, with its creation parameters.
#[derive(Debug, Clone, Copy)]
pub enum Creation<'a> {
    Adapter(&'a RequestAdapterOptions),
    Device(&'a DeviceDescriptor),
    Queue,
    Buffer(&'a BufferDescriptor),
    Texture(&'a TextureDescriptor),
    TextureView(&'a TextureViewDescriptor),
    QuerySet(&'a QuerySetDescriptor),
    RenderPipeline(&'a RenderPipelineDescriptor),
    BindGroup(&'a BindGroupDescriptor),
    CommandEncoder(&'a CommandEncoderDescriptor),
    RenderBundle(&'a RenderBundleDescriptor),
    RenderPass(&'a RenderPassDescriptor),
    CommandBuffer { label: Option<&'a str> },
}

impl Creation<'_> {
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Creation::Adapter(_) => ObjectKind::Adapter,
            Creation::Device(_) => ObjectKind::Device,
            Creation::Queue => ObjectKind::Queue,
            Creation::Buffer(_) => ObjectKind::Buffer,
            Creation::Texture(_) => ObjectKind::Texture,
            Creation::TextureView(_) => ObjectKind::TextureView,
            Creation::QuerySet(_) => ObjectKind::QuerySet,
            Creation::RenderPipeline(_) => ObjectKind::RenderPipeline,
            Creation::BindGroup(_) => ObjectKind::BindGroup,
            Creation::CommandEncoder(_) => ObjectKind::CommandEncoder,
            Creation::RenderBundle(_) => ObjectKind::RenderBundle,
            Creation::RenderPass(_) => ObjectKind::RenderPassEncoder,
            Creation::CommandBuffer { .. } => ObjectKind::CommandBuffer,
        }
    }
}

/// The native graphics implementation driven by remote dispatch.
///
/// Every handle passed in was issued by this backend and is still owned by
/// a live host object. Calls for one command stream arrive in order; calls
/// from different streams may arrive concurrently.
pub trait Backend: Send + Sync + 'static {
    /// Create a resource. `parent` is the adapter, device, texture or
    /// encoder it is created from; `None` for adapters and for devices
    /// created straight from the connection.
    fn create(
        &self,
        parent: Option<BackingHandle>,
        creation: Creation<'_>,
        handles: &Handles,
    ) -> BackendResult<BackingHandle>;

    /// Submit command buffers in order. Called only once every buffer has
    /// resolved.
    fn submit(&self, queue: BackingHandle, command_buffers: &[BackingHandle]) -> BackendResult<()>;

    /// Fulfil `completion` once previously submitted work is done. Dropping
    /// it unfulfilled reports the callback as cancelled.
    fn on_submitted_work_done(&self, queue: BackingHandle, completion: Completion);

    fn write_buffer(
        &self,
        queue: BackingHandle,
        buffer: BackingHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()>;

    fn write_texture(
        &self,
        queue: BackingHandle,
        texture: BackingHandle,
        destination: &ImageCopyTexture,
        data: &[u8],
        layout: &ImageDataLayout,
        size: &Extent3D,
    ) -> BackendResult<()>;

    fn copy_external_image_to_texture(
        &self,
        queue: BackingHandle,
        source: &ImageCopyExternalImage,
        texture: BackingHandle,
        destination: &ImageCopyTextureTagged,
        copy_size: &Extent3D,
    ) -> BackendResult<()>;

    fn read_buffer(&self, buffer: BackingHandle, offset: u64, size: u64) -> BackendResult<Bytes>;

    /// Destroy a buffer's or texture's contents ahead of release.
    fn destroy(&self, kind: ObjectKind, handle: BackingHandle) -> BackendResult<()>;

    fn copy_buffer_to_buffer(
        &self,
        encoder: BackingHandle,
        source: BackingHandle,
        source_offset: u64,
        destination: BackingHandle,
        destination_offset: u64,
        size: u64,
    ) -> BackendResult<()>;

    /// Record one render pass command.
    fn encode_render_pass(
        &self,
        pass: BackingHandle,
        op: &RenderPassOp,
        handles: &Handles,
    ) -> BackendResult<()>;

    fn set_label(&self, kind: ObjectKind, handle: BackingHandle, label: &str);

    /// The host object owning `handle` is gone. Called exactly once per
    /// handle.
    fn release(&self, kind: ObjectKind, handle: BackingHandle);
}
