//! An in-memory [`Backend`] that keeps buffer and texture contents in host
//! memory and records every call it receives.
//!
//! It enforces the usage, bounds and encoder-state rules a real device
//! would, so remote dispatch can be exercised end to end without graphics
//! hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use gpuremote_wire::types::{
    BufferUsage, Extent3D, ExternalImageSource, ImageCopyExternalImage, ImageCopyTexture,
    ImageCopyTextureTagged, ImageDataLayout, TextureFormat, TextureUsage,
};
use gpuremote_wire::{ObjectKind, RenderPassOp};
use tracing::trace;

use crate::backend::{Backend, BackendError, BackendResult, BackingHandle, Creation, Handles};
use crate::completion::Completion;

/// One call the backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub call: &'static str,
    pub target: Option<BackingHandle>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy)]
struct BufferCopy {
    source: BackingHandle,
    source_offset: u64,
    destination: BackingHandle,
    destination_offset: u64,
    size: u64,
}

#[derive(Debug)]
enum Resource {
    Adapter,
    Device,
    Queue,
    Buffer {
        usage: BufferUsage,
        data: Vec<u8>,
        destroyed: bool,
    },
    Texture {
        size: Extent3D,
        format: TextureFormat,
        usage: TextureUsage,
        mip_level_count: u32,
        data: Vec<u8>,
        destroyed: bool,
    },
    TextureView,
    QuerySet {
        count: u32,
    },
    RenderPipeline,
    BindGroup,
    RenderBundle,
    CommandEncoder {
        copies: Vec<BufferCopy>,
        open_pass: Option<BackingHandle>,
        finished: bool,
    },
    RenderPass {
        encoder: BackingHandle,
        occlusion_query_set: Option<BackingHandle>,
        debug_depth: u32,
        ended: bool,
    },
    CommandBuffer {
        copies: Vec<BufferCopy>,
        submitted: bool,
    },
}

impl Resource {
    fn kind(&self) -> ObjectKind {
        match self {
            Resource::Adapter => ObjectKind::Adapter,
            Resource::Device => ObjectKind::Device,
            Resource::Queue => ObjectKind::Queue,
            Resource::Buffer { .. } => ObjectKind::Buffer,
            Resource::Texture { .. } => ObjectKind::Texture,
            Resource::TextureView => ObjectKind::TextureView,
            Resource::QuerySet { .. } => ObjectKind::QuerySet,
            Resource::RenderPipeline => ObjectKind::RenderPipeline,
            Resource::BindGroup => ObjectKind::BindGroup,
            Resource::RenderBundle => ObjectKind::RenderBundle,
            Resource::CommandEncoder { .. } => ObjectKind::CommandEncoder,
            Resource::RenderPass { .. } => ObjectKind::RenderPassEncoder,
            Resource::CommandBuffer { .. } => ObjectKind::CommandBuffer,
        }
    }
}

#[derive(Default)]
struct State {
    resources: HashMap<BackingHandle, Resource>,
    labels: HashMap<BackingHandle, String>,
    journal: Vec<JournalEntry>,
    released: Vec<(ObjectKind, BackingHandle)>,
    held: Vec<Completion>,
}

impl State {
    fn record(&mut self, call: &'static str, target: Option<BackingHandle>, detail: String) {
        trace!(call, target = ?target, %detail, "backend call");
        self.journal.push(JournalEntry {
            call,
            target,
            detail,
        });
    }

    fn get_mut(&mut self, handle: BackingHandle, kind: ObjectKind) -> BackendResult<&mut Resource> {
        match self.resources.get_mut(&handle) {
            Some(resource) if resource.kind() == kind => Ok(resource),
            Some(resource) => Err(BackendError(format!(
                "{handle} is a {}, expected a {kind}",
                resource.kind()
            ))),
            None => Err(BackendError(format!("unknown handle {handle}"))),
        }
    }

    fn expect(&self, handle: BackingHandle, kind: ObjectKind) -> BackendResult<&Resource> {
        match self.resources.get(&handle) {
            Some(resource) if resource.kind() == kind => Ok(resource),
            Some(resource) => Err(BackendError(format!(
                "{handle} is a {}, expected a {kind}",
                resource.kind()
            ))),
            None => Err(BackendError(format!("unknown handle {handle}"))),
        }
    }

    fn buffer(&self, handle: BackingHandle) -> BackendResult<(BufferUsage, &[u8])> {
        match self.expect(handle, ObjectKind::Buffer)? {
            Resource::Buffer { destroyed: true, .. } => {
                Err(BackendError(format!("buffer {handle} is destroyed")))
            }
            Resource::Buffer { usage, data, .. } => Ok((*usage, data.as_slice())),
            _ => Err(BackendError(format!("unknown handle {handle}"))),
        }
    }

    fn buffer_mut(&mut self, handle: BackingHandle) -> BackendResult<(BufferUsage, &mut Vec<u8>)> {
        match self.get_mut(handle, ObjectKind::Buffer)? {
            Resource::Buffer { destroyed: true, .. } => {
                Err(BackendError(format!("buffer {handle} is destroyed")))
            }
            Resource::Buffer { usage, data, .. } => Ok((*usage, data)),
            _ => Err(BackendError(format!("unknown handle {handle}"))),
        }
    }

    /// An encoder that is still recording outside a render pass.
    fn recording_encoder(&mut self, handle: BackingHandle) -> BackendResult<&mut Vec<BufferCopy>> {
        match self.get_mut(handle, ObjectKind::CommandEncoder)? {
            Resource::CommandEncoder { finished: true, .. } => {
                Err(BackendError(format!("encoder {handle} is finished")))
            }
            Resource::CommandEncoder {
                open_pass: Some(pass),
                ..
            } => Err(BackendError(format!(
                "encoder {handle} has render pass {pass} open"
            ))),
            Resource::CommandEncoder { copies, .. } => Ok(copies),
            _ => Err(BackendError(format!("unknown handle {handle}"))),
        }
    }

    fn check_copy(&self, copy: &BufferCopy) -> BackendResult<()> {
        if copy.source == copy.destination {
            return Err(BackendError::new("copy source and destination are the same buffer"));
        }
        if copy.size % 4 != 0 || copy.source_offset % 4 != 0 || copy.destination_offset % 4 != 0 {
            return Err(BackendError::new("buffer copies must be 4-byte aligned"));
        }
        let (usage, data) = self.buffer(copy.source)?;
        if !usage.contains(BufferUsage::COPY_SRC) {
            return Err(BackendError(format!("buffer {} lacks COPY_SRC", copy.source)));
        }
        check_range(copy.source_offset, copy.size, data.len())?;
        let (usage, data) = self.buffer(copy.destination)?;
        if !usage.contains(BufferUsage::COPY_DST) {
            return Err(BackendError(format!(
                "buffer {} lacks COPY_DST",
                copy.destination
            )));
        }
        check_range(copy.destination_offset, copy.size, data.len())
    }

    fn run_copy(&mut self, copy: &BufferCopy) -> BackendResult<()> {
        self.check_copy(copy)?;
        let (start, end) = (copy.source_offset as usize, (copy.source_offset + copy.size) as usize);
        let chunk = self.buffer(copy.source)?.1[start..end].to_vec();
        let (_, data) = self.buffer_mut(copy.destination)?;
        let at = copy.destination_offset as usize;
        data[at..at + chunk.len()].copy_from_slice(&chunk);
        Ok(())
    }
}

fn check_range(offset: u64, size: u64, len: usize) -> BackendResult<()> {
    match offset.checked_add(size) {
        Some(end) if end <= len as u64 => Ok(()),
        _ => Err(BackendError(format!(
            "range {offset}+{size} is out of bounds for {len} bytes"
        ))),
    }
}

/// Parameters of a copy into texture memory, already validated against the
/// texture's extent.
struct TexelCopy<'a> {
    source: &'a [u8],
    source_offset: u64,
    bytes_per_row: u64,
    rows_per_image: u64,
    origin: (u32, u32, u32),
    size: Extent3D,
}

fn copy_texels(
    texture: &mut [u8],
    extent: Extent3D,
    texel: u32,
    copy: &TexelCopy<'_>,
) -> BackendResult<()> {
    let row_len = u64::from(copy.size.width) * u64::from(texel);
    for z in 0..u64::from(copy.size.depth_or_array_layers) {
        for y in 0..u64::from(copy.size.height) {
            let src = z
                .checked_mul(copy.rows_per_image)
                .and_then(|row| row.checked_add(y))
                .and_then(|row| row.checked_mul(copy.bytes_per_row))
                .and_then(|at| at.checked_add(copy.source_offset))
                .ok_or_else(|| BackendError::new("source layout overflows"))?;
            check_range(src, row_len, copy.source.len())?;
            let dst_row = (u64::from(copy.origin.2) + z) * u64::from(extent.height)
                + u64::from(copy.origin.1)
                + y;
            let dst = (dst_row * u64::from(extent.width) + u64::from(copy.origin.0))
                * u64::from(texel);
            check_range(dst, row_len, texture.len())?;
            let (src, dst, len) = (src as usize, dst as usize, row_len as usize);
            texture[dst..dst + len].copy_from_slice(&copy.source[src..src + len]);
        }
    }
    Ok(())
}

fn fits(origin: u32, size: u32, limit: u32) -> bool {
    origin.checked_add(size).is_some_and(|end| end <= limit)
}

/// Largest buffer or texture [`MemoryBackend`] allocates by default.
pub const DEFAULT_MAX_ALLOCATION: u64 = 256 * 1024 * 1024;

/// The reference in-memory backend.
pub struct MemoryBackend {
    next_handle: AtomicU64,
    max_allocation: u64,
    state: Mutex<State>,
    hold_completions: bool,
    latency: HashMap<&'static str, Duration>,
    failures: HashMap<&'static str, String>,
    panics: HashMap<&'static str, String>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            max_allocation: DEFAULT_MAX_ALLOCATION,
            state: Mutex::new(State::default()),
            hold_completions: false,
            latency: HashMap::new(),
            failures: HashMap::new(),
            panics: HashMap::new(),
        }
    }

    /// Keep work-done completions until [`MemoryBackend::complete_held`]
    /// instead of completing them right away.
    pub fn with_held_completions(mut self) -> Self {
        self.hold_completions = true;
        self
    }

    /// Refuse buffers and textures larger than `bytes`.
    pub fn with_max_allocation(mut self, bytes: u64) -> Self {
        self.max_allocation = bytes;
        self
    }

    /// Sleep for `delay` at the start of every `call`.
    pub fn with_latency(mut self, call: &'static str, delay: Duration) -> Self {
        self.latency.insert(call, delay);
        self
    }

    /// Fail every `call` with `message`.
    pub fn with_failure(mut self, call: &'static str, message: impl Into<String>) -> Self {
        self.failures.insert(call, message.into());
        self
    }

    /// Panic with `message` on every `call`, as a faulty driver would.
    pub fn with_panic(mut self, call: &'static str, message: impl Into<String>) -> Self {
        self.panics.insert(call, message.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, call: &'static str) -> BackendResult<()> {
        if let Some(delay) = self.latency.get(call) {
            std::thread::sleep(*delay);
        }
        if let Some(message) = self.panics.get(call) {
            panic!("{message}");
        }
        match self.failures.get(call) {
            Some(message) => Err(BackendError(message.clone())),
            None => Ok(()),
        }
    }

    /// Zeroed storage of `bytes`, where `None` means the size overflowed.
    fn zeroed(&self, what: &str, bytes: Option<u64>) -> BackendResult<Vec<u8>> {
        let len = bytes
            .filter(|bytes| *bytes <= self.max_allocation)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| {
                BackendError(format!(
                    "{what} exceeds the {} byte allocation limit",
                    self.max_allocation
                ))
            })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|err| BackendError(format!("{what} of {len} bytes: {err}")))?;
        data.resize(len, 0);
        Ok(data)
    }

    fn allocate(&self) -> BackingHandle {
        BackingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Every call received so far, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state().journal.clone()
    }

    /// How many times `call` was received.
    pub fn calls(&self, call: &str) -> usize {
        self.state()
            .journal
            .iter()
            .filter(|entry| entry.call == call)
            .count()
    }

    /// Released handles, in release order.
    pub fn released(&self) -> Vec<(ObjectKind, BackingHandle)> {
        self.state().released.clone()
    }

    /// Live handles of `kind`, in creation order.
    pub fn handles_of(&self, kind: ObjectKind) -> Vec<BackingHandle> {
        let mut live: Vec<_> = self
            .state()
            .resources
            .iter()
            .filter(|(_, resource)| resource.kind() == kind)
            .map(|(handle, _)| *handle)
            .collect();
        live.sort();
        live
    }

    pub fn live_objects(&self) -> usize {
        self.state().resources.len()
    }

    pub fn buffer_contents(&self, buffer: BackingHandle) -> Option<Vec<u8>> {
        match self.state().resources.get(&buffer) {
            Some(Resource::Buffer { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Mip level 0 of a texture, rows packed.
    pub fn texture_contents(&self, texture: BackingHandle) -> Option<Vec<u8>> {
        match self.state().resources.get(&texture) {
            Some(Resource::Texture { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn label_of(&self, handle: BackingHandle) -> Option<String> {
        self.state().labels.get(&handle).cloned()
    }

    pub fn held_completions(&self) -> usize {
        self.state().held.len()
    }

    /// Complete every held work-done completion. Returns how many.
    pub fn complete_held(&self) -> usize {
        let held = std::mem::take(&mut self.state().held);
        let count = held.len();
        for completion in held {
            completion.complete();
        }
        count
    }

    fn create_resource(
        &self,
        state: &mut State,
        parent: Option<BackingHandle>,
        creation: Creation<'_>,
        handles: &Handles,
        handle: BackingHandle,
    ) -> BackendResult<Resource> {
        let parent_kind = match creation {
            Creation::Adapter(_) => None,
            Creation::Device(_) => parent.map(|_| ObjectKind::Adapter),
            Creation::TextureView(_) => Some(ObjectKind::Texture),
            Creation::RenderPass(_) | Creation::CommandBuffer { .. } => {
                Some(ObjectKind::CommandEncoder)
            }
            _ => Some(ObjectKind::Device),
        };
        let parent = match (parent_kind, parent) {
            (None, None) => None,
            (Some(kind), Some(parent)) => {
                state.expect(parent, kind)?;
                Some(parent)
            }
            (None, Some(_)) => return Err(BackendError::new("adapters have no parent")),
            (Some(kind), None) => {
                return Err(BackendError(format!("{} needs a parent {kind}", creation.kind())))
            }
        };

        let resource = match creation {
            Creation::Adapter(_) => Resource::Adapter,
            Creation::Device(_) => Resource::Device,
            Creation::Queue => Resource::Queue,
            Creation::Buffer(descriptor) => {
                if descriptor.size % 4 != 0 && descriptor.mapped_at_creation {
                    return Err(BackendError::new(
                        "buffers mapped at creation must have a size that is a multiple of 4",
                    ));
                }
                Resource::Buffer {
                    usage: descriptor.usage,
                    data: self.zeroed("buffer", Some(descriptor.size))?,
                    destroyed: false,
                }
            }
            Creation::Texture(descriptor) => {
                let extent = descriptor.size;
                if extent.width == 0 || extent.height == 0 || extent.depth_or_array_layers == 0 {
                    return Err(BackendError::new("texture extent must be non-zero"));
                }
                if descriptor.mip_level_count == 0 {
                    return Err(BackendError::new("texture needs at least one mip level"));
                }
                let bytes = u64::from(extent.width)
                    .checked_mul(u64::from(extent.height))
                    .and_then(|texels| texels.checked_mul(u64::from(extent.depth_or_array_layers)))
                    .and_then(|texels| match descriptor.format.texel_size() {
                        Some(size) => texels.checked_mul(u64::from(size)),
                        None => Some(0),
                    });
                Resource::Texture {
                    size: extent,
                    format: descriptor.format,
                    usage: descriptor.usage,
                    mip_level_count: descriptor.mip_level_count,
                    data: self.zeroed("texture", bytes)?,
                    destroyed: false,
                }
            }
            Creation::TextureView(descriptor) => {
                if let (Some(parent), Some(count)) = (parent, descriptor.mip_level_count) {
                    if let Resource::Texture {
                        mip_level_count, ..
                    } = state.expect(parent, ObjectKind::Texture)?
                    {
                        if !fits(descriptor.base_mip_level, count, *mip_level_count) {
                            return Err(BackendError::new("view mip range exceeds the texture"));
                        }
                    }
                }
                Resource::TextureView
            }
            Creation::QuerySet(descriptor) => Resource::QuerySet {
                count: descriptor.count,
            },
            Creation::RenderPipeline(_) => Resource::RenderPipeline,
            Creation::BindGroup(_) => Resource::BindGroup,
            Creation::RenderBundle(_) => Resource::RenderBundle,
            Creation::CommandEncoder(_) => Resource::CommandEncoder {
                copies: Vec::new(),
                open_pass: None,
                finished: false,
            },
            Creation::RenderPass(descriptor) => {
                let encoder = parent.ok_or_else(|| BackendError::new("render pass needs an encoder"))?;
                state.recording_encoder(encoder)?;
                if let Resource::CommandEncoder { open_pass, .. } =
                    state.get_mut(encoder, ObjectKind::CommandEncoder)?
                {
                    *open_pass = Some(handle);
                }
                Resource::RenderPass {
                    encoder,
                    occlusion_query_set: descriptor
                        .occlusion_query_set
                        .map(|id| handles.require(id))
                        .transpose()?,
                    debug_depth: 0,
                    ended: false,
                }
            }
            Creation::CommandBuffer { .. } => {
                let encoder =
                    parent.ok_or_else(|| BackendError::new("command buffer needs an encoder"))?;
                let copies = std::mem::take(state.recording_encoder(encoder)?);
                if let Resource::CommandEncoder { finished, .. } =
                    state.get_mut(encoder, ObjectKind::CommandEncoder)?
                {
                    *finished = true;
                }
                Resource::CommandBuffer {
                    copies,
                    submitted: false,
                }
            }
        };
        Ok(resource)
    }
}

impl Backend for MemoryBackend {
    fn create(
        &self,
        parent: Option<BackingHandle>,
        creation: Creation<'_>,
        handles: &Handles,
    ) -> BackendResult<BackingHandle> {
        self.enter("create")?;
        let handle = self.allocate();
        let mut state = self.state();
        let resource = self.create_resource(&mut state, parent, creation, handles, handle)?;
        state.record("create", Some(handle), format!("{} parent={parent:?}", creation.kind()));
        state.resources.insert(handle, resource);
        Ok(handle)
    }

    fn submit(&self, queue: BackingHandle, command_buffers: &[BackingHandle]) -> BackendResult<()> {
        self.enter("submit")?;
        let mut state = self.state();
        state.expect(queue, ObjectKind::Queue)?;
        for (index, buffer) in command_buffers.iter().enumerate() {
            if let Resource::CommandBuffer { submitted: true, .. } =
                state.expect(*buffer, ObjectKind::CommandBuffer)?
            {
                return Err(BackendError(format!("command buffer {buffer} was already submitted")));
            }
            if command_buffers[..index].contains(buffer) {
                return Err(BackendError(format!("command buffer {buffer} appears twice")));
            }
        }
        // Validate every recorded copy before anything runs, so a bad buffer
        // leaves the whole submission unapplied.
        let mut copies = Vec::new();
        for buffer in command_buffers {
            if let Resource::CommandBuffer { copies: recorded, .. } =
                state.expect(*buffer, ObjectKind::CommandBuffer)?
            {
                copies.extend_from_slice(recorded);
            }
        }
        for copy in &copies {
            state.check_copy(copy)?;
        }
        for buffer in command_buffers {
            if let Resource::CommandBuffer { copies, submitted } =
                state.get_mut(*buffer, ObjectKind::CommandBuffer)?
            {
                *submitted = true;
                copies.clear();
            }
        }
        for copy in &copies {
            state.run_copy(copy)?;
        }
        state.record(
            "submit",
            Some(queue),
            format!("command_buffers={command_buffers:?}"),
        );
        Ok(())
    }

    fn on_submitted_work_done(&self, queue: BackingHandle, completion: Completion) {
        if let Err(err) = self.enter("on_submitted_work_done") {
            completion.fail(err.0);
            return;
        }
        let mut state = self.state();
        if let Err(err) = state.expect(queue, ObjectKind::Queue) {
            drop(state);
            completion.fail(err.0);
            return;
        }
        state.record(
            "on_submitted_work_done",
            Some(queue),
            format!("callback={}", completion.callback()),
        );
        if self.hold_completions {
            state.held.push(completion);
        } else {
            drop(state);
            completion.complete();
        }
    }

    fn write_buffer(
        &self,
        queue: BackingHandle,
        buffer: BackingHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        self.enter("write_buffer")?;
        let mut state = self.state();
        state.expect(queue, ObjectKind::Queue)?;
        let (usage, contents) = state.buffer_mut(buffer)?;
        if !usage.contains(BufferUsage::COPY_DST) {
            return Err(BackendError(format!("buffer {buffer} lacks COPY_DST")));
        }
        if offset % 4 != 0 || data.len() % 4 != 0 {
            return Err(BackendError::new("buffer writes must be 4-byte aligned"));
        }
        check_range(offset, data.len() as u64, contents.len())?;
        let at = offset as usize;
        contents[at..at + data.len()].copy_from_slice(data);
        state.record(
            "write_buffer",
            Some(buffer),
            format!("offset={offset} len={}", data.len()),
        );
        Ok(())
    }

    fn write_texture(
        &self,
        queue: BackingHandle,
        texture: BackingHandle,
        destination: &ImageCopyTexture,
        data: &[u8],
        layout: &ImageDataLayout,
        size: &Extent3D,
    ) -> BackendResult<()> {
        self.enter("write_texture")?;
        let mut state = self.state();
        state.expect(queue, ObjectKind::Queue)?;
        let Resource::Texture {
            size: extent,
            format,
            usage,
            mip_level_count,
            data: contents,
            destroyed,
        } = state.get_mut(texture, ObjectKind::Texture)?
        else {
            return Err(BackendError(format!("unknown handle {texture}")));
        };
        if *destroyed {
            return Err(BackendError(format!("texture {texture} is destroyed")));
        }
        if !usage.contains(TextureUsage::COPY_DST) {
            return Err(BackendError(format!("texture {texture} lacks COPY_DST")));
        }
        if destination.mip_level >= *mip_level_count {
            return Err(BackendError(format!(
                "mip level {} out of range",
                destination.mip_level
            )));
        }
        let texel = format
            .texel_size()
            .ok_or_else(|| BackendError(format!("{} cannot be written directly", format.name())))?;
        let origin = destination.origin.unwrap_or_default();
        if !fits(origin.x, size.width, extent.width)
            || !fits(origin.y, size.height, extent.height)
            || !fits(origin.z, size.depth_or_array_layers, extent.depth_or_array_layers)
        {
            return Err(BackendError::new("texture write exceeds the texture extent"));
        }
        let row = u64::from(size.width) * u64::from(texel);
        let bytes_per_row = layout.bytes_per_row.map_or(row, u64::from);
        if bytes_per_row < row {
            return Err(BackendError::new("bytes_per_row is smaller than one row"));
        }
        let rows_per_image = layout
            .rows_per_image
            .map_or(u64::from(size.height), u64::from);
        if destination.mip_level == 0 {
            let extent = *extent;
            copy_texels(
                contents,
                extent,
                texel,
                &TexelCopy {
                    source: data,
                    source_offset: layout.offset,
                    bytes_per_row,
                    rows_per_image,
                    origin: (origin.x, origin.y, origin.z),
                    size: *size,
                },
            )?;
        }
        state.record(
            "write_texture",
            Some(texture),
            format!(
                "mip={} {}x{}x{} len={}",
                destination.mip_level,
                size.width,
                size.height,
                size.depth_or_array_layers,
                data.len()
            ),
        );
        Ok(())
    }

    fn copy_external_image_to_texture(
        &self,
        queue: BackingHandle,
        source: &ImageCopyExternalImage,
        texture: BackingHandle,
        destination: &ImageCopyTextureTagged,
        copy_size: &Extent3D,
    ) -> BackendResult<()> {
        self.enter("copy_external_image_to_texture")?;
        let mut state = self.state();
        state.expect(queue, ObjectKind::Queue)?;
        let Resource::Texture {
            size: extent,
            format,
            usage,
            data: contents,
            destroyed,
            ..
        } = state.get_mut(texture, ObjectKind::Texture)?
        else {
            return Err(BackendError(format!("unknown handle {texture}")));
        };
        if *destroyed {
            return Err(BackendError(format!("texture {texture} is destroyed")));
        }
        if !usage.contains(TextureUsage::COPY_DST) {
            return Err(BackendError(format!("texture {texture} lacks COPY_DST")));
        }
        if copy_size.depth_or_array_layers != 1 {
            return Err(BackendError::new("external images are copied one layer at a time"));
        }
        let target = destination.texture.origin.unwrap_or_default();
        if !fits(target.x, copy_size.width, extent.width)
            || !fits(target.y, copy_size.height, extent.height)
            || !fits(target.z, 1, extent.depth_or_array_layers)
        {
            return Err(BackendError::new("copy exceeds the destination texture"));
        }

        let detail = match &source.source {
            ExternalImageSource::Bitmap {
                width,
                height,
                pixels,
            } => {
                if *width == 0 || *height == 0 {
                    return Err(BackendError::new("bitmap has no pixels"));
                }
                let expected = u64::from(*width) * u64::from(*height) * 4;
                if pixels.len() as u64 != expected {
                    return Err(BackendError(format!(
                        "bitmap holds {} bytes, expected {expected} for {width}x{height} RGBA",
                        pixels.len()
                    )));
                }
                let from = source.origin.unwrap_or_default();
                if !fits(from.x, copy_size.width, *width) || !fits(from.y, copy_size.height, *height)
                {
                    return Err(BackendError::new("copy exceeds the source image"));
                }
                if matches!(format, TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb)
                    && destination.texture.mip_level == 0
                {
                    let extent = *extent;
                    let stride = u64::from(*width) * 4;
                    let rows: Vec<u8>;
                    let source_bytes: &[u8] = if source.flip_y {
                        rows = pixels
                            .chunks(stride as usize)
                            .rev()
                            .flatten()
                            .copied()
                            .collect();
                        &rows
                    } else {
                        pixels
                    };
                    copy_texels(
                        contents,
                        extent,
                        4,
                        &TexelCopy {
                            source: source_bytes,
                            source_offset: u64::from(from.y) * stride + u64::from(from.x) * 4,
                            bytes_per_row: stride,
                            rows_per_image: u64::from(*height),
                            origin: (target.x, target.y, target.z),
                            size: *copy_size,
                        },
                    )?;
                }
                format!("bitmap {width}x{height}")
            }
            ExternalImageSource::SharedSurface { handle } => format!("surface {handle}"),
        };
        state.record("copy_external_image_to_texture", Some(texture), detail);
        Ok(())
    }

    fn read_buffer(&self, buffer: BackingHandle, offset: u64, size: u64) -> BackendResult<Bytes> {
        self.enter("read_buffer")?;
        let mut state = self.state();
        let (usage, contents) = state.buffer(buffer)?;
        if !usage.contains(BufferUsage::MAP_READ) {
            return Err(BackendError(format!("buffer {buffer} lacks MAP_READ")));
        }
        check_range(offset, size, contents.len())?;
        let bytes = Bytes::copy_from_slice(&contents[offset as usize..(offset + size) as usize]);
        state.record("read_buffer", Some(buffer), format!("offset={offset} size={size}"));
        Ok(bytes)
    }

    fn destroy(&self, kind: ObjectKind, handle: BackingHandle) -> BackendResult<()> {
        self.enter("destroy")?;
        let mut state = self.state();
        match state.get_mut(handle, kind)? {
            Resource::Buffer {
                destroyed, data, ..
            } => {
                *destroyed = true;
                data.clear();
            }
            Resource::Texture {
                destroyed, data, ..
            } => {
                *destroyed = true;
                data.clear();
            }
            _ => return Err(BackendError(format!("a {kind} cannot be destroyed"))),
        }
        state.record("destroy", Some(handle), kind.to_string());
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &self,
        encoder: BackingHandle,
        source: BackingHandle,
        source_offset: u64,
        destination: BackingHandle,
        destination_offset: u64,
        size: u64,
    ) -> BackendResult<()> {
        self.enter("copy_buffer_to_buffer")?;
        let mut state = self.state();
        let copy = BufferCopy {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        };
        state.recording_encoder(encoder)?;
        state.check_copy(&copy)?;
        state.recording_encoder(encoder)?.push(copy);
        state.record(
            "copy_buffer_to_buffer",
            Some(encoder),
            format!("{source}+{source_offset} -> {destination}+{destination_offset} size={size}"),
        );
        Ok(())
    }

    fn encode_render_pass(
        &self,
        pass: BackingHandle,
        op: &RenderPassOp,
        handles: &Handles,
    ) -> BackendResult<()> {
        self.enter("encode_render_pass")?;
        let mut state = self.state();
        let Resource::RenderPass {
            encoder,
            occlusion_query_set,
            debug_depth,
            ended,
        } = state.get_mut(pass, ObjectKind::RenderPassEncoder)?
        else {
            return Err(BackendError(format!("unknown handle {pass}")));
        };
        if *ended {
            return Err(BackendError(format!("render pass {pass} has ended")));
        }
        let encoder = *encoder;
        match op {
            RenderPassOp::SetIndexBuffer { format, offset, .. } => {
                if offset % format.index_size() != 0 {
                    return Err(BackendError::new("index buffer offset is not index aligned"));
                }
            }
            RenderPassOp::PushDebugGroup { .. } => *debug_depth += 1,
            RenderPassOp::PopDebugGroup => {
                if *debug_depth == 0 {
                    return Err(BackendError::new("no debug group to pop"));
                }
                *debug_depth -= 1;
            }
            RenderPassOp::BeginOcclusionQuery { .. } if occlusion_query_set.is_none() => {
                return Err(BackendError::new("render pass has no occlusion query set"));
            }
            RenderPassOp::BeginPipelineStatisticsQuery {
                query_set,
                query_index,
            } => {
                let set = match query_set {
                    Some(id) => handles.require(*id)?,
                    None => occlusion_query_set.ok_or_else(|| {
                        BackendError::new("render pass has no occlusion query set")
                    })?,
                };
                if let Resource::QuerySet { count } = state.expect(set, ObjectKind::QuerySet)? {
                    if query_index >= count {
                        return Err(BackendError(format!(
                            "query index {query_index} out of range for {count} queries"
                        )));
                    }
                }
            }
            RenderPassOp::EndPass => {
                if *debug_depth != 0 {
                    return Err(BackendError::new("render pass ended with open debug groups"));
                }
                *ended = true;
                if let Ok(Resource::CommandEncoder { open_pass, .. }) =
                    state.get_mut(encoder, ObjectKind::CommandEncoder)
                {
                    *open_pass = None;
                }
            }
            _ => {}
        }
        state.record("encode_render_pass", Some(pass), op.name().to_string());
        Ok(())
    }

    fn set_label(&self, kind: ObjectKind, handle: BackingHandle, label: &str) {
        if self.enter("set_label").is_err() {
            return;
        }
        let mut state = self.state();
        state.labels.insert(handle, label.to_string());
        state.record("set_label", Some(handle), format!("{kind} {label:?}"));
    }

    fn release(&self, kind: ObjectKind, handle: BackingHandle) {
        let mut state = self.state();
        if let Some(Resource::RenderPass {
            encoder,
            ended: false,
            ..
        }) = state.resources.remove(&handle)
        {
            if let Ok(Resource::CommandEncoder { open_pass, .. }) =
                state.get_mut(encoder, ObjectKind::CommandEncoder)
            {
                *open_pass = None;
            }
        }
        state.labels.remove(&handle);
        state.released.push((kind, handle));
        state.record("release", Some(handle), kind.to_string());
    }
}
