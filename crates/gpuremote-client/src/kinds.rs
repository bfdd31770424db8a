//! Operations for each proxy kind.
//!
//! Creation methods post the creation and return the child proxy straight
//! away; the child lives on its parent's stream. Everything here is a post
//! except reading a buffer, which waits for the host's reply.

use bytes::Bytes;
use gpuremote_wire::kind::{
    Adapter, BindGroup, Buffer, CommandBuffer, CommandEncoder, Device, Queue, QuerySet,
    RenderBundle, RenderPassEncoder, RenderPipeline, Texture, TextureView,
};
use gpuremote_wire::types::{
    BindGroupDescriptor, BufferDescriptor, Color, CommandEncoderDescriptor, DeviceDescriptor,
    Extent3D, ImageCopyExternalImage, ImageCopyTexture, ImageCopyTextureTagged, ImageDataLayout,
    IndexFormat, QuerySetDescriptor, RenderBundleDescriptor, RenderPassDescriptor,
    RenderPipelineDescriptor, TextureDescriptor, TextureViewDescriptor,
};
use gpuremote_wire::{
    AdapterOp, BufferOp, CallbackOutcome, CommandEncoderOp, DeviceOp, QueueOp, RenderPassOp,
    ReplyValue, TextureOp,
};

use crate::error::{ClientError, Result};
use crate::proxy::Proxy;
use crate::work_done::WorkDone;

impl Proxy<Adapter> {
    pub fn request_device(&self, descriptor: &DeviceDescriptor) -> Result<Proxy<Device>> {
        self.create_child(|device| AdapterOp::RequestDevice {
            device,
            descriptor: descriptor.clone(),
        })
    }
}

impl Proxy<Device> {
    pub fn create_queue(&self) -> Result<Proxy<Queue>> {
        self.create_child(|queue| DeviceOp::CreateQueue { queue })
    }

    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Proxy<Buffer>> {
        self.create_child(|buffer| DeviceOp::CreateBuffer {
            buffer,
            descriptor: descriptor.clone(),
        })
    }

    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Proxy<Texture>> {
        self.create_child(|texture| DeviceOp::CreateTexture {
            texture,
            descriptor: descriptor.clone(),
        })
    }

    pub fn create_query_set(&self, descriptor: &QuerySetDescriptor) -> Result<Proxy<QuerySet>> {
        self.create_child(|query_set| DeviceOp::CreateQuerySet {
            query_set,
            descriptor: descriptor.clone(),
        })
    }

    pub fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Proxy<RenderPipeline>> {
        self.create_child(|pipeline| DeviceOp::CreateRenderPipeline {
            pipeline,
            descriptor: descriptor.clone(),
        })
    }

    /// Every buffer and view the entries name must resolve on the host, or
    /// the bind group is not created.
    pub fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<Proxy<BindGroup>> {
        self.create_child(|bind_group| DeviceOp::CreateBindGroup {
            bind_group,
            descriptor: descriptor.clone(),
        })
    }

    pub fn create_command_encoder(
        &self,
        descriptor: &CommandEncoderDescriptor,
    ) -> Result<Proxy<CommandEncoder>> {
        self.create_child(|encoder| DeviceOp::CreateCommandEncoder {
            encoder,
            descriptor: descriptor.clone(),
        })
    }

    pub fn create_render_bundle(
        &self,
        descriptor: &RenderBundleDescriptor,
    ) -> Result<Proxy<RenderBundle>> {
        self.create_child(|bundle| DeviceOp::CreateRenderBundle {
            bundle,
            descriptor: descriptor.clone(),
        })
    }
}

impl Proxy<Queue> {
    /// Submit command buffers. If any of them does not resolve on the host,
    /// none are submitted.
    pub fn submit(&self, command_buffers: &[&Proxy<CommandBuffer>]) -> Result<()> {
        self.post_op(QueueOp::Submit {
            command_buffers: command_buffers.iter().map(|cb| cb.id()).collect(),
        })
    }

    /// Be told when the work submitted so far has finished.
    pub fn on_submitted_work_done(&self) -> Result<WorkDone> {
        let conn = self.connection();
        let (callback, rx) = conn.callbacks().register();
        if let Err(err) = self.post_op(QueueOp::OnSubmittedWorkDone { callback }) {
            conn.callbacks().fulfill(callback, CallbackOutcome::Cancelled);
            return Err(err);
        }
        Ok(WorkDone::new(callback, conn.session_key(), rx))
    }

    /// Run `handler` with the outcome instead of returning a handle.
    ///
    /// The handler runs on the connection's reader thread. Blocking requests
    /// on the same connection fail there with
    /// [`ClientError::ReentrantRequest`]; posts are fine.
    pub fn on_submitted_work_done_with<F>(&self, handler: F) -> Result<()>
    where
        F: FnOnce(CallbackOutcome) + Send + 'static,
    {
        let conn = self.connection();
        let callback = conn.callbacks().register_handler(Box::new(handler));
        if let Err(err) = self.post_op(QueueOp::OnSubmittedWorkDone { callback }) {
            conn.callbacks().fulfill(callback, CallbackOutcome::Cancelled);
            return Err(err);
        }
        Ok(())
    }

    pub fn write_buffer(
        &self,
        buffer: &Proxy<Buffer>,
        offset: u64,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        self.post_op(QueueOp::WriteBuffer {
            buffer: buffer.id(),
            offset,
            data: data.into(),
        })
    }

    pub fn write_texture(
        &self,
        destination: &ImageCopyTexture,
        data: impl Into<Bytes>,
        layout: ImageDataLayout,
        size: Extent3D,
    ) -> Result<()> {
        self.post_op(QueueOp::WriteTexture {
            destination: destination.clone(),
            data: data.into(),
            layout,
            size,
        })
    }

    pub fn copy_external_image_to_texture(
        &self,
        source: &ImageCopyExternalImage,
        destination: &ImageCopyTextureTagged,
        copy_size: Extent3D,
    ) -> Result<()> {
        self.post_op(QueueOp::CopyExternalImageToTexture {
            source: source.clone(),
            destination: destination.clone(),
            copy_size,
        })
    }
}

impl Proxy<Buffer> {
    /// Read `size` bytes starting at `offset`. Blocks for the reply.
    pub fn read(&self, offset: u64, size: u64) -> Result<Bytes> {
        match self.request_op(BufferOp::Read { offset, size })? {
            ReplyValue::Data { bytes } => Ok(bytes),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    pub fn destroy(&self) -> Result<()> {
        self.post_op(BufferOp::Destroy)
    }
}

impl Proxy<Texture> {
    pub fn create_view(&self, descriptor: &TextureViewDescriptor) -> Result<Proxy<TextureView>> {
        self.create_child(|view| TextureOp::CreateView {
            view,
            descriptor: descriptor.clone(),
        })
    }

    pub fn destroy(&self) -> Result<()> {
        self.post_op(TextureOp::Destroy)
    }
}

impl Proxy<CommandEncoder> {
    /// Attachments and the occlusion query set must all resolve, or no pass
    /// is begun.
    pub fn begin_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Proxy<RenderPassEncoder>> {
        self.create_child(|pass| CommandEncoderOp::BeginRenderPass {
            pass,
            descriptor: descriptor.clone(),
        })
    }

    pub fn copy_buffer_to_buffer(
        &self,
        source: &Proxy<Buffer>,
        source_offset: u64,
        destination: &Proxy<Buffer>,
        destination_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.post_op(CommandEncoderOp::CopyBufferToBuffer {
            source: source.id(),
            source_offset,
            destination: destination.id(),
            destination_offset,
            size,
        })
    }

    pub fn finish(&self, label: Option<&str>) -> Result<Proxy<CommandBuffer>> {
        self.create_child(|command_buffer| CommandEncoderOp::Finish {
            command_buffer,
            label: label.map(str::to_owned),
        })
    }
}

impl Proxy<RenderPassEncoder> {
    pub fn set_pipeline(&self, pipeline: &Proxy<RenderPipeline>) -> Result<()> {
        self.post_op(RenderPassOp::SetPipeline {
            pipeline: pipeline.id(),
        })
    }

    pub fn set_index_buffer(
        &self,
        buffer: &Proxy<Buffer>,
        format: IndexFormat,
        offset: u64,
        size: Option<u64>,
    ) -> Result<()> {
        self.post_op(RenderPassOp::SetIndexBuffer {
            buffer: buffer.id(),
            format,
            offset,
            size,
        })
    }

    pub fn set_vertex_buffer(
        &self,
        slot: u32,
        buffer: &Proxy<Buffer>,
        offset: u64,
        size: Option<u64>,
    ) -> Result<()> {
        self.post_op(RenderPassOp::SetVertexBuffer {
            slot,
            buffer: buffer.id(),
            offset,
            size,
        })
    }

    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.post_op(RenderPassOp::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        })
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.post_op(RenderPassOp::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        })
    }

    pub fn draw_indirect(&self, indirect_buffer: &Proxy<Buffer>, indirect_offset: u64) -> Result<()> {
        self.post_op(RenderPassOp::DrawIndirect {
            indirect_buffer: indirect_buffer.id(),
            indirect_offset,
        })
    }

    pub fn draw_indexed_indirect(
        &self,
        indirect_buffer: &Proxy<Buffer>,
        indirect_offset: u64,
    ) -> Result<()> {
        self.post_op(RenderPassOp::DrawIndexedIndirect {
            indirect_buffer: indirect_buffer.id(),
            indirect_offset,
        })
    }

    pub fn set_bind_group(
        &self,
        index: u32,
        bind_group: &Proxy<BindGroup>,
        dynamic_offsets: Option<&[u32]>,
    ) -> Result<()> {
        self.post_op(RenderPassOp::SetBindGroup {
            index,
            bind_group: bind_group.id(),
            dynamic_offsets: dynamic_offsets.map(<[u32]>::to_vec),
        })
    }

    pub fn push_debug_group(&self, label: impl Into<String>) -> Result<()> {
        self.post_op(RenderPassOp::PushDebugGroup {
            label: label.into(),
        })
    }

    pub fn pop_debug_group(&self) -> Result<()> {
        self.post_op(RenderPassOp::PopDebugGroup)
    }

    pub fn insert_debug_marker(&self, label: impl Into<String>) -> Result<()> {
        self.post_op(RenderPassOp::InsertDebugMarker {
            label: label.into(),
        })
    }

    pub fn set_viewport(
        &self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) -> Result<()> {
        self.post_op(RenderPassOp::SetViewport {
            x,
            y,
            width,
            height,
            min_depth,
            max_depth,
        })
    }

    pub fn set_scissor_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        self.post_op(RenderPassOp::SetScissorRect {
            x,
            y,
            width,
            height,
        })
    }

    pub fn set_blend_constant(&self, color: Color) -> Result<()> {
        self.post_op(RenderPassOp::SetBlendConstant { color })
    }

    pub fn set_stencil_reference(&self, reference: u32) -> Result<()> {
        self.post_op(RenderPassOp::SetStencilReference { reference })
    }

    /// Uses the pass's occlusion query set.
    pub fn begin_occlusion_query(&self, query_index: u32) -> Result<()> {
        self.post_op(RenderPassOp::BeginOcclusionQuery { query_index })
    }

    pub fn end_occlusion_query(&self) -> Result<()> {
        self.post_op(RenderPassOp::EndOcclusionQuery)
    }

    /// With no query set, the pass's occlusion query set is used.
    pub fn begin_pipeline_statistics_query(
        &self,
        query_set: Option<&Proxy<QuerySet>>,
        query_index: u32,
    ) -> Result<()> {
        self.post_op(RenderPassOp::BeginPipelineStatisticsQuery {
            query_set: query_set.map(Proxy::id),
            query_index,
        })
    }

    pub fn end_pipeline_statistics_query(&self) -> Result<()> {
        self.post_op(RenderPassOp::EndPipelineStatisticsQuery)
    }

    /// All bundles resolve or none are executed.
    pub fn execute_bundles(&self, bundles: &[&Proxy<RenderBundle>]) -> Result<()> {
        self.post_op(RenderPassOp::ExecuteBundles {
            bundles: bundles.iter().map(|bundle| bundle.id()).collect(),
        })
    }

    pub fn end_pass(&self) -> Result<()> {
        self.post_op(RenderPassOp::EndPass)
    }
}
