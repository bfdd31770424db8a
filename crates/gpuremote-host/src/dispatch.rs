//! Routing decoded commands to the backend.
//!
//! Every identifier an operation references is resolved, in argument order,
//! before the backend sees anything. The first identifier that does not
//! resolve to a live object of the expected kind aborts the whole operation.
//! The heap lock is held only while resolving, adopting or removing, never
//! across a backend call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gpuremote_frame::{stream_label, StreamId};
use gpuremote_wire::kind::{
    Adapter, Buffer, CommandEncoder, Device, Queue, RenderPassEncoder, Texture,
};
use gpuremote_wire::types::{BindGroupDescriptor, BindingResource, RenderPassDescriptor};
use gpuremote_wire::{
    AdapterOp, BufferOp, Command, CommandEncoderOp, CommonOp, DeviceOp, GpuOp, Identifier,
    ObjectKind, ObjectOp, QueueOp, RemoteFault, RenderPassOp, ReplyValue, ResourceKind, TextureOp,
};
use tracing::debug;

use crate::backend::{Backend, BackingHandle, Creation, Handles};
use crate::completion::CompletionTracker;
use crate::heap::ObjectHeap;
use crate::remote::Remote;

/// What a handler produced: the reply value, or why the operation was
/// aborted.
pub type Outcome = Result<ReplyValue, RemoteFault>;

/// The object an operation is addressed to, already resolved.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub id: Identifier,
    pub handle: BackingHandle,
}

/// Everything a handler may touch while dispatching one command.
pub struct DispatchContext<'a> {
    pub backend: &'a Arc<dyn Backend>,
    pub heap: &'a Mutex<ObjectHeap>,
    pub completions: &'a Arc<CompletionTracker>,
    pub stream: StreamId,
}

impl DispatchContext<'_> {
    fn heap(&self) -> MutexGuard<'_, ObjectHeap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve every `(identifier, kind)` pair, in order, all or nothing.
    pub fn resolve_all(&self, refs: &[(Identifier, ObjectKind)]) -> Result<Handles, RemoteFault> {
        let heap = self.heap();
        let mut handles = Handles::new();
        for &(id, kind) in refs {
            handles.insert(id, heap.resolve_kind(id, kind)?);
        }
        Ok(handles)
    }

    pub fn resolve(&self, id: Identifier, kind: ObjectKind) -> Result<BackingHandle, RemoteFault> {
        self.heap().resolve_kind(id, kind)
    }

    /// Create a backing resource and adopt it as `id`.
    ///
    /// A live `id` is rejected before the backend is asked for anything.
    pub fn create(
        &self,
        parent: Option<BackingHandle>,
        id: Identifier,
        creation: Creation<'_>,
        handles: &Handles,
    ) -> Outcome {
        self.heap().ensure_vacant(id)?;
        let kind = creation.kind();
        let handle = self.backend.create(parent, creation, handles)?;
        let remote = Remote::new(id, kind, handle, Arc::clone(self.backend));
        let adopted = self.heap().adopt(remote);
        match adopted {
            Ok(()) => {
                debug!(stream = %stream_label(self.stream), target = %id, %kind, %handle, "object created");
                Ok(ReplyValue::Unit)
            }
            // Another stream adopted the same identifier in the meantime. The
            // rejected remote releases its backing resource here, unlocked.
            Err(rejected) => {
                drop(rejected);
                Err(RemoteFault::DuplicateIdentifier { id })
            }
        }
    }

    /// Drop the object named `id` and cancel the completions it owns.
    pub fn release(&self, id: Identifier) -> Outcome {
        let removed = self.heap().remove(id);
        let Some(remote) = removed else {
            return Err(RemoteFault::UnresolvedIdentifier { id });
        };
        let cancelled = self.completions.cancel_owned_by(id);
        debug!(
            stream = %stream_label(self.stream),
            target = %id,
            kind = %remote.kind(),
            cancelled,
            "object released"
        );
        drop(remote);
        Ok(ReplyValue::Unit)
    }
}

/// Host-side handling of one resource kind's operations.
pub trait RemoteKind: ResourceKind {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: Self::Op) -> Outcome;
}

/// Dispatch one decoded command.
pub fn dispatch(ctx: &DispatchContext<'_>, command: Command) -> Outcome {
    match command {
        Command::Gpu(GpuOp::CreateDevice { device, descriptor }) => ctx.create(
            None,
            device,
            Creation::Device(&descriptor),
            &Handles::new(),
        ),
        Command::Gpu(GpuOp::RequestAdapter { adapter, options }) => ctx.create(
            None,
            adapter,
            Creation::Adapter(&options),
            &Handles::new(),
        ),
        Command::Gpu(GpuOp::Synchronize) => Ok(ReplyValue::Unit),
        Command::Object {
            target,
            op: ObjectOp::Common(op),
        } => dispatch_common(ctx, target, op),
        Command::Object { target, op } => match op {
            ObjectOp::Adapter(op) => route::<Adapter>(ctx, target, op),
            ObjectOp::Device(op) => route::<Device>(ctx, target, op),
            ObjectOp::Queue(op) => route::<Queue>(ctx, target, op),
            ObjectOp::Buffer(op) => route::<Buffer>(ctx, target, op),
            ObjectOp::Texture(op) => route::<Texture>(ctx, target, op),
            ObjectOp::CommandEncoder(op) => route::<CommandEncoder>(ctx, target, op),
            ObjectOp::RenderPass(op) => route::<RenderPassEncoder>(ctx, target, op),
            ObjectOp::Common(op) => dispatch_common(ctx, target, op),
        },
    }
}

fn route<K: RemoteKind>(ctx: &DispatchContext<'_>, id: Identifier, op: K::Op) -> Outcome {
    let handle = ctx.resolve(id, K::KIND)?;
    K::dispatch(ctx, Target { id, handle }, op)
}

fn dispatch_common(ctx: &DispatchContext<'_>, id: Identifier, op: CommonOp) -> Outcome {
    match op {
        CommonOp::SetLabel { label } => {
            let (kind, handle) = ctx.heap().lookup(id)?;
            ctx.backend.set_label(kind, handle, &label);
            Ok(ReplyValue::Unit)
        }
        CommonOp::Release => ctx.release(id),
    }
}

fn bind_group_refs(descriptor: &BindGroupDescriptor) -> Vec<(Identifier, ObjectKind)> {
    descriptor
        .entries
        .iter()
        .map(|entry| match entry.resource {
            BindingResource::Buffer { buffer, .. } => (buffer, ObjectKind::Buffer),
            BindingResource::TextureView { view } => (view, ObjectKind::TextureView),
        })
        .collect()
}

fn render_pass_refs(descriptor: &RenderPassDescriptor) -> Vec<(Identifier, ObjectKind)> {
    let mut refs = Vec::new();
    for attachment in &descriptor.color_attachments {
        refs.push((attachment.view, ObjectKind::TextureView));
        if let Some(resolve) = attachment.resolve_target {
            refs.push((resolve, ObjectKind::TextureView));
        }
    }
    if let Some(depth) = &descriptor.depth_stencil_attachment {
        refs.push((depth.view, ObjectKind::TextureView));
    }
    if let Some(query_set) = descriptor.occlusion_query_set {
        refs.push((query_set, ObjectKind::QuerySet));
    }
    refs
}

fn render_pass_op_refs(op: &RenderPassOp) -> Vec<(Identifier, ObjectKind)> {
    match op {
        RenderPassOp::SetPipeline { pipeline } => vec![(*pipeline, ObjectKind::RenderPipeline)],
        RenderPassOp::SetIndexBuffer { buffer, .. }
        | RenderPassOp::SetVertexBuffer { buffer, .. } => vec![(*buffer, ObjectKind::Buffer)],
        RenderPassOp::DrawIndirect {
            indirect_buffer, ..
        }
        | RenderPassOp::DrawIndexedIndirect {
            indirect_buffer, ..
        } => vec![(*indirect_buffer, ObjectKind::Buffer)],
        RenderPassOp::SetBindGroup { bind_group, .. } => {
            vec![(*bind_group, ObjectKind::BindGroup)]
        }
        RenderPassOp::BeginPipelineStatisticsQuery {
            query_set: Some(query_set),
            ..
        } => vec![(*query_set, ObjectKind::QuerySet)],
        RenderPassOp::ExecuteBundles { bundles } => bundles
            .iter()
            .map(|bundle| (*bundle, ObjectKind::RenderBundle))
            .collect(),
        _ => Vec::new(),
    }
}

impl RemoteKind for Adapter {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: AdapterOp) -> Outcome {
        match op {
            AdapterOp::RequestDevice { device, descriptor } => ctx.create(
                Some(target.handle),
                device,
                Creation::Device(&descriptor),
                &Handles::new(),
            ),
        }
    }
}

impl RemoteKind for Device {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: DeviceOp) -> Outcome {
        let parent = Some(target.handle);
        let none = Handles::new();
        match op {
            DeviceOp::CreateQueue { queue } => ctx.create(parent, queue, Creation::Queue, &none),
            DeviceOp::CreateBuffer { buffer, descriptor } => {
                ctx.create(parent, buffer, Creation::Buffer(&descriptor), &none)
            }
            DeviceOp::CreateTexture {
                texture,
                descriptor,
            } => ctx.create(parent, texture, Creation::Texture(&descriptor), &none),
            DeviceOp::CreateQuerySet {
                query_set,
                descriptor,
            } => ctx.create(parent, query_set, Creation::QuerySet(&descriptor), &none),
            DeviceOp::CreateRenderPipeline {
                pipeline,
                descriptor,
            } => ctx.create(parent, pipeline, Creation::RenderPipeline(&descriptor), &none),
            DeviceOp::CreateBindGroup {
                bind_group,
                descriptor,
            } => {
                let handles = ctx.resolve_all(&bind_group_refs(&descriptor))?;
                ctx.create(parent, bind_group, Creation::BindGroup(&descriptor), &handles)
            }
            DeviceOp::CreateCommandEncoder {
                encoder,
                descriptor,
            } => ctx.create(parent, encoder, Creation::CommandEncoder(&descriptor), &none),
            DeviceOp::CreateRenderBundle { bundle, descriptor } => {
                ctx.create(parent, bundle, Creation::RenderBundle(&descriptor), &none)
            }
        }
    }
}

impl RemoteKind for Queue {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: QueueOp) -> Outcome {
        match op {
            QueueOp::Submit { command_buffers } => {
                let refs: Vec<_> = command_buffers
                    .iter()
                    .map(|id| (*id, ObjectKind::CommandBuffer))
                    .collect();
                let handles = ctx.resolve_all(&refs)?;
                let ordered: Vec<_> = command_buffers
                    .iter()
                    .filter_map(|id| handles.get(*id))
                    .collect();
                ctx.backend.submit(target.handle, &ordered)?;
            }
            QueueOp::OnSubmittedWorkDone { callback } => {
                let completion = ctx.completions.track(callback, target.id, ctx.stream)?;
                ctx.backend.on_submitted_work_done(target.handle, completion);
            }
            QueueOp::WriteBuffer {
                buffer,
                offset,
                data,
            } => {
                let buffer = ctx.resolve(buffer, ObjectKind::Buffer)?;
                ctx.backend
                    .write_buffer(target.handle, buffer, offset, &data)?;
            }
            QueueOp::WriteTexture {
                destination,
                data,
                layout,
                size,
            } => {
                let texture = ctx.resolve(destination.texture, ObjectKind::Texture)?;
                ctx.backend.write_texture(
                    target.handle,
                    texture,
                    &destination,
                    &data,
                    &layout,
                    &size,
                )?;
            }
            QueueOp::CopyExternalImageToTexture {
                source,
                destination,
                copy_size,
            } => {
                let texture = ctx.resolve(destination.texture.texture, ObjectKind::Texture)?;
                ctx.backend.copy_external_image_to_texture(
                    target.handle,
                    &source,
                    texture,
                    &destination,
                    &copy_size,
                )?;
            }
        }
        Ok(ReplyValue::Unit)
    }
}

impl RemoteKind for Buffer {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: BufferOp) -> Outcome {
        match op {
            BufferOp::Read { offset, size } => {
                let bytes = ctx.backend.read_buffer(target.handle, offset, size)?;
                Ok(ReplyValue::Data { bytes })
            }
            BufferOp::Destroy => {
                ctx.backend.destroy(ObjectKind::Buffer, target.handle)?;
                Ok(ReplyValue::Unit)
            }
        }
    }
}

impl RemoteKind for Texture {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: TextureOp) -> Outcome {
        match op {
            TextureOp::CreateView { view, descriptor } => ctx.create(
                Some(target.handle),
                view,
                Creation::TextureView(&descriptor),
                &Handles::new(),
            ),
            TextureOp::Destroy => {
                ctx.backend.destroy(ObjectKind::Texture, target.handle)?;
                Ok(ReplyValue::Unit)
            }
        }
    }
}

impl RemoteKind for CommandEncoder {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: CommandEncoderOp) -> Outcome {
        match op {
            CommandEncoderOp::BeginRenderPass { pass, descriptor } => {
                let handles = ctx.resolve_all(&render_pass_refs(&descriptor))?;
                ctx.create(
                    Some(target.handle),
                    pass,
                    Creation::RenderPass(&descriptor),
                    &handles,
                )
            }
            CommandEncoderOp::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => {
                let handles = ctx.resolve_all(&[
                    (source, ObjectKind::Buffer),
                    (destination, ObjectKind::Buffer),
                ])?;
                ctx.backend.copy_buffer_to_buffer(
                    target.handle,
                    handles.require(source)?,
                    source_offset,
                    handles.require(destination)?,
                    destination_offset,
                    size,
                )?;
                Ok(ReplyValue::Unit)
            }
            CommandEncoderOp::Finish {
                command_buffer,
                label,
            } => ctx.create(
                Some(target.handle),
                command_buffer,
                Creation::CommandBuffer {
                    label: label.as_deref(),
                },
                &Handles::new(),
            ),
        }
    }
}

impl RemoteKind for RenderPassEncoder {
    fn dispatch(ctx: &DispatchContext<'_>, target: Target, op: RenderPassOp) -> Outcome {
        let handles = ctx.resolve_all(&render_pass_op_refs(&op))?;
        ctx.backend
            .encode_render_pass(target.handle, &op, &handles)?;
        Ok(ReplyValue::Unit)
    }
}
