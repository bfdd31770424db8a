//! Parameter structs carried by commands.
//!
//! Field order is the wire order. Identifiers inside these structs are
//! resolved by the host before any backend call is made.

use bitflags::{bitflags, Flags};
use bytes::Bytes;

use crate::codec::{Decode, Decoder, Encode, Encoder};
use crate::error::{Result, WireError};
use crate::ids::Identifier;

bitflags! {
    /// How a buffer may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const MAP_READ = 0x0001;
        const MAP_WRITE = 0x0002;
        const COPY_SRC = 0x0004;
        const COPY_DST = 0x0008;
        const INDEX = 0x0010;
        const VERTEX = 0x0020;
        const UNIFORM = 0x0040;
        const STORAGE = 0x0080;
        const INDIRECT = 0x0100;
        const QUERY_RESOLVE = 0x0200;
    }
}

bitflags! {
    /// How a texture may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 0x01;
        const COPY_DST = 0x02;
        const TEXTURE_BINDING = 0x04;
        const STORAGE_BINDING = 0x08;
        const RENDER_ATTACHMENT = 0x10;
    }
}

/// Flag sets travel as their raw `u32`; undeclared bits fail decoding.
fn decode_flags<F: Flags<Bits = u32>>(dec: &mut Decoder<'_>, ty: &'static str) -> Result<F> {
    let bits = dec.u32()?;
    F::from_bits(bits).ok_or(WireError::UnknownFlags {
        ty,
        bits: bits & !F::all().bits(),
    })
}

impl Encode for BufferUsage {
    fn encode(&self, enc: &mut Encoder) {
        enc.u32(self.bits());
    }
}

impl Decode for BufferUsage {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        decode_flags(dec, "BufferUsage")
    }
}

impl Encode for TextureUsage {
    fn encode(&self, enc: &mut Encoder) {
        enc.u32(self.bits());
    }
}

impl Decode for TextureUsage {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        decode_flags(dec, "TextureUsage")
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TextureFormat {
        R8Unorm = 0,
        Rg8Unorm = 1,
        Rgba8Unorm = 2,
        Rgba8UnormSrgb = 3,
        Bgra8Unorm = 4,
        Bgra8UnormSrgb = 5,
        Rgba16Float = 6,
        Rgba32Float = 7,
        Stencil8 = 8,
        Depth16Unorm = 9,
        Depth24Plus = 10,
        Depth24PlusStencil8 = 11,
        Depth32Float = 12,
    }
}

impl TextureFormat {
    /// Bytes per texel, or `None` for formats whose layout is opaque.
    pub const fn texel_size(self) -> Option<u32> {
        match self {
            Self::R8Unorm | Self::Stencil8 => Some(1),
            Self::Rg8Unorm | Self::Depth16Unorm => Some(2),
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth32Float => Some(4),
            Self::Rgba16Float => Some(8),
            Self::Rgba32Float => Some(16),
            Self::Depth24Plus | Self::Depth24PlusStencil8 => None,
        }
    }

    pub const fn has_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24Plus | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::Stencil8 | Self::Depth24PlusStencil8)
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum TextureDimension {
        D1 = 0,
        #[default]
        D2 = 1,
        D3 = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum TextureAspect {
        #[default]
        All = 0,
        StencilOnly = 1,
        DepthOnly = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum CompareFunction {
        Never = 0,
        Less = 1,
        Equal = 2,
        LessEqual = 3,
        Greater = 4,
        NotEqual = 5,
        GreaterEqual = 6,
        Always = 7,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum StencilOperation {
        Keep = 0,
        Zero = 1,
        Replace = 2,
        Invert = 3,
        IncrementClamp = 4,
        DecrementClamp = 5,
        IncrementWrap = 6,
        DecrementWrap = 7,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum StoreOp {
        #[default]
        Store = 0,
        Discard = 1,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum IndexFormat {
        Uint16 = 0,
        Uint32 = 1,
    }
}

impl IndexFormat {
    pub const fn index_size(self) -> u64 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum QueryType {
        Occlusion = 0,
        PipelineStatistics = 1,
        Timestamp = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum PrimitiveTopology {
        PointList = 0,
        LineList = 1,
        LineStrip = 2,
        #[default]
        TriangleList = 3,
        TriangleStrip = 4,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum VertexFormat {
        Unorm8x4 = 0,
        Uint32 = 1,
        Sint32 = 2,
        Float32 = 3,
        Float32x2 = 4,
        Float32x3 = 5,
        Float32x4 = 6,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum VertexStepMode {
        #[default]
        Vertex = 0,
        Instance = 1,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum PredefinedColorSpace {
        #[default]
        Srgb = 0,
        DisplayP3 = 1,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Color {
        pub r: f64,
        pub g: f64,
        pub b: f64,
        pub a: f64,
    }
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Extent3D {
        pub width: u32,
        pub height: u32,
        pub depth_or_array_layers: u32,
    }
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth_or_array_layers: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers,
        }
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Origin3D {
        pub x: u32,
        pub y: u32,
        pub z: u32,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Origin2D {
        pub x: u32,
        pub y: u32,
    }
}

wire_struct! {
    /// A region of one texture mip level. An absent origin means (0, 0, 0).
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ImageCopyTexture {
        pub texture: Identifier,
        pub mip_level: u32,
        pub origin: Option<Origin3D>,
        pub aspect: TextureAspect,
    }
}

impl ImageCopyTexture {
    pub fn new(texture: Identifier) -> Self {
        Self {
            texture,
            mip_level: 0,
            origin: None,
            aspect: TextureAspect::All,
        }
    }
}

wire_struct! {
    /// A copy destination that also states how colour values are encoded.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ImageCopyTextureTagged {
        pub texture: ImageCopyTexture,
        pub color_space: PredefinedColorSpace,
        pub premultiplied_alpha: bool,
    }
}

wire_struct! {
    /// Layout of linear texel data supplied with a texture write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ImageDataLayout {
        pub offset: u64,
        pub bytes_per_row: Option<u32>,
        pub rows_per_image: Option<u32>,
    }
}

wire_variants! {
    /// Where an external image's pixels come from.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ExternalImageSource {
        /// Tightly packed RGBA8 pixels shipped inline.
        0 => Bitmap { width: u32, height: u32, pixels: Bytes },
        /// A surface already shared with the host process.
        1 => SharedSurface { handle: u64 },
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ImageCopyExternalImage {
        pub source: ExternalImageSource,
        pub origin: Option<Origin2D>,
        pub flip_y: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StencilFaceState {
        pub compare: CompareFunction,
        pub fail_op: StencilOperation,
        pub depth_fail_op: StencilOperation,
        pub pass_op: StencilOperation,
    }
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct DepthStencilState {
        pub format: TextureFormat,
        pub depth_write_enabled: bool,
        pub depth_compare: CompareFunction,
        pub stencil_front: StencilFaceState,
        pub stencil_back: StencilFaceState,
        pub stencil_read_mask: Option<u32>,
        pub stencil_write_mask: Option<u32>,
        pub depth_bias: i32,
        pub depth_bias_slope_scale: f32,
        pub depth_bias_clamp: f32,
    }
}

/// What an attachment holds when a pass begins: its previous contents, or a
/// value it is cleared to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadValue<T> {
    Load,
    Clear(T),
}

impl<T: Encode> Encode for LoadValue<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            LoadValue::Load => enc.u8(0),
            LoadValue::Clear(value) => {
                enc.u8(1);
                value.encode(enc);
            }
        }
    }
}

impl<T: Decode> Decode for LoadValue<T> {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.u8()? {
            0 => Ok(LoadValue::Load),
            1 => T::decode(dec).map(LoadValue::Clear),
            tag => Err(WireError::InvalidTag {
                ty: "LoadValue",
                tag,
            }),
        }
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct RenderPassColorAttachment {
        pub view: Identifier,
        pub resolve_target: Option<Identifier>,
        pub load_value: LoadValue<Color>,
        pub store_op: StoreOp,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct RenderPassDepthStencilAttachment {
        pub view: Identifier,
        pub depth_load_value: LoadValue<f32>,
        pub depth_store_op: StoreOp,
        pub depth_read_only: bool,
        pub stencil_load_value: LoadValue<u32>,
        pub stencil_store_op: StoreOp,
        pub stencil_read_only: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct RenderPassDescriptor {
        pub label: Option<String>,
        pub color_attachments: Vec<RenderPassColorAttachment>,
        pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
        pub occlusion_query_set: Option<Identifier>,
    }
}

impl RenderPassDescriptor {
    /// Every identifier the pass references, in wire order.
    pub fn referenced_identifiers(&self) -> Vec<Identifier> {
        let mut ids = Vec::with_capacity(self.color_attachments.len() * 2 + 2);
        for attachment in &self.color_attachments {
            ids.push(attachment.view);
            ids.extend(attachment.resolve_target);
        }
        if let Some(depth) = &self.depth_stencil_attachment {
            ids.push(depth.view);
        }
        ids.extend(self.occlusion_query_set);
        ids
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexAttribute {
        pub format: VertexFormat,
        pub offset: u64,
        pub shader_location: u32,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct VertexBufferLayout {
        pub array_stride: u64,
        pub step_mode: VertexStepMode,
        pub attributes: Vec<VertexAttribute>,
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Limits {
        pub max_bind_groups: u32,
        pub max_buffer_size: u64,
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bind_groups: 4,
            max_buffer_size: 256 * 1024 * 1024,
        }
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum PowerPreference {
        LowPower = 0,
        HighPerformance = 1,
    }
}

wire_struct! {
    /// Hints for picking an adapter. A backend with a single adapter may
    /// ignore them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RequestAdapterOptions {
        pub power_preference: Option<PowerPreference>,
        pub force_fallback_adapter: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct DeviceDescriptor {
        pub label: Option<String>,
        pub required_limits: Option<Limits>,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct BufferDescriptor {
        pub label: Option<String>,
        pub size: u64,
        pub usage: BufferUsage,
        pub mapped_at_creation: bool,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TextureDescriptor {
        pub label: Option<String>,
        pub size: Extent3D,
        pub mip_level_count: u32,
        pub sample_count: u32,
        pub dimension: TextureDimension,
        pub format: TextureFormat,
        pub usage: TextureUsage,
    }
}

wire_struct! {
    /// Absent fields inherit from the texture.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct TextureViewDescriptor {
        pub label: Option<String>,
        pub format: Option<TextureFormat>,
        pub aspect: TextureAspect,
        pub base_mip_level: u32,
        pub mip_level_count: Option<u32>,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct QuerySetDescriptor {
        pub label: Option<String>,
        pub ty: QueryType,
        pub count: u32,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct RenderPipelineDescriptor {
        pub label: Option<String>,
        pub vertex_buffers: Vec<VertexBufferLayout>,
        pub primitive_topology: PrimitiveTopology,
        pub depth_stencil: Option<DepthStencilState>,
        pub color_formats: Vec<TextureFormat>,
    }
}

wire_variants! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum BindingResource {
        0 => Buffer { buffer: Identifier, offset: u64, size: Option<u64> },
        1 => TextureView { view: Identifier },
    }
}

impl BindingResource {
    pub fn identifier(&self) -> Identifier {
        match self {
            BindingResource::Buffer { buffer, .. } => *buffer,
            BindingResource::TextureView { view } => *view,
        }
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindGroupEntry {
        pub binding: u32,
        pub resource: BindingResource,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct BindGroupDescriptor {
        pub label: Option<String>,
        pub entries: Vec<BindGroupEntry>,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct CommandEncoderDescriptor {
        pub label: Option<String>,
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RenderBundleDescriptor {
        pub label: Option<String>,
        pub color_formats: Vec<TextureFormat>,
        pub depth_stencil_format: Option<TextureFormat>,
        pub sample_count: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_bytes, to_bytes};

    fn id(raw: u64) -> Identifier {
        Identifier::new(raw).unwrap()
    }

    fn full_depth_stencil() -> DepthStencilState {
        DepthStencilState {
            format: TextureFormat::Depth24PlusStencil8,
            depth_write_enabled: true,
            depth_compare: CompareFunction::LessEqual,
            stencil_front: StencilFaceState {
                compare: CompareFunction::Equal,
                fail_op: StencilOperation::Zero,
                depth_fail_op: StencilOperation::Invert,
                pass_op: StencilOperation::IncrementWrap,
            },
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: Some(0xff),
            stencil_write_mask: Some(0x0f),
            depth_bias: -3,
            depth_bias_slope_scale: 1.5,
            depth_bias_clamp: 0.25,
        }
    }

    #[test]
    fn depth_stencil_with_every_optional_present() {
        let state = full_depth_stencil();
        assert_eq!(from_bytes::<DepthStencilState>(&to_bytes(&state)), Ok(state));
    }

    #[test]
    fn depth_stencil_with_every_optional_absent() {
        let state = DepthStencilState {
            stencil_read_mask: None,
            stencil_write_mask: None,
            ..full_depth_stencil()
        };
        let bytes = to_bytes(&state);
        assert_eq!(bytes.len(), to_bytes(&full_depth_stencil()).len() - 8);
        assert_eq!(from_bytes::<DepthStencilState>(&bytes), Ok(state));
    }

    #[test]
    fn depth_stencil_truncated_anywhere_fails() {
        let bytes = to_bytes(&full_depth_stencil());
        for cut in 0..bytes.len() {
            assert!(
                from_bytes::<DepthStencilState>(&bytes[..cut]).is_err(),
                "prefix of {cut} bytes decoded"
            );
        }
    }

    #[test]
    fn load_value_arms() {
        let load: LoadValue<Color> = LoadValue::Load;
        let clear = LoadValue::Clear(Color::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(&to_bytes(&load)[..], &[0]);
        assert_eq!(from_bytes::<LoadValue<Color>>(&to_bytes(&load)), Ok(load));
        assert_eq!(from_bytes::<LoadValue<Color>>(&to_bytes(&clear)), Ok(clear));
        assert_eq!(
            from_bytes::<LoadValue<u32>>(&[2, 0, 0, 0, 0]),
            Err(WireError::InvalidTag {
                ty: "LoadValue",
                tag: 2
            })
        );
    }

    #[test]
    fn render_pass_descriptor_nested_optionals() {
        let descriptor = RenderPassDescriptor {
            label: Some("main pass".into()),
            color_attachments: vec![
                RenderPassColorAttachment {
                    view: id(4),
                    resolve_target: Some(id(5)),
                    load_value: LoadValue::Clear(Color::BLACK),
                    store_op: StoreOp::Store,
                },
                RenderPassColorAttachment {
                    view: id(6),
                    resolve_target: None,
                    load_value: LoadValue::Load,
                    store_op: StoreOp::Discard,
                },
            ],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: id(7),
                depth_load_value: LoadValue::Clear(1.0),
                depth_store_op: StoreOp::Store,
                depth_read_only: false,
                stencil_load_value: LoadValue::Load,
                stencil_store_op: StoreOp::Discard,
                stencil_read_only: true,
            }),
            occlusion_query_set: Some(id(8)),
        };

        let decoded = from_bytes::<RenderPassDescriptor>(&to_bytes(&descriptor)).unwrap();
        assert_eq!(decoded, descriptor);
        assert_eq!(
            decoded.referenced_identifiers(),
            vec![id(4), id(5), id(6), id(7), id(8)]
        );

        let empty = RenderPassDescriptor::default();
        assert_eq!(from_bytes::<RenderPassDescriptor>(&to_bytes(&empty)), Ok(empty));
    }

    #[test]
    fn zero_identifier_inside_nested_struct_aborts_decode() {
        let mut bytes = to_bytes(&ImageCopyTexture::new(id(9))).to_vec();
        bytes[..8].copy_from_slice(&0u64.to_le_bytes());
        assert_eq!(
            from_bytes::<ImageCopyTexture>(&bytes),
            Err(WireError::ZeroIdentifier)
        );
    }

    #[test]
    fn external_image_source_arms() {
        let bitmap = ImageCopyExternalImage {
            source: ExternalImageSource::Bitmap {
                width: 1,
                height: 1,
                pixels: Bytes::from_static(&[1, 2, 3, 4]),
            },
            origin: None,
            flip_y: true,
        };
        let shared = ImageCopyExternalImage {
            source: ExternalImageSource::SharedSurface { handle: 77 },
            origin: Some(Origin2D { x: 2, y: 3 }),
            flip_y: false,
        };
        for image in [bitmap, shared] {
            assert_eq!(from_bytes::<ImageCopyExternalImage>(&to_bytes(&image)), Ok(image));
        }
    }

    #[test]
    fn usage_flags_keep_their_bit_values() {
        assert_eq!(BufferUsage::MAP_READ.bits(), 0x1);
        assert_eq!(BufferUsage::QUERY_RESOLVE.bits(), 0x200);
        assert_eq!(TextureUsage::RENDER_ATTACHMENT.bits(), 0x10);

        let usage = BufferUsage::COPY_DST | BufferUsage::MAP_READ;
        assert!(usage.contains(BufferUsage::MAP_READ));
        assert!(!usage.contains(BufferUsage::VERTEX));
        assert_eq!(from_bytes::<BufferUsage>(&to_bytes(&usage)), Ok(usage));
    }

    #[test]
    fn unknown_flag_bits_fail() {
        assert_eq!(
            from_bytes::<TextureUsage>(&0x21u32.to_le_bytes()),
            Err(WireError::UnknownFlags {
                ty: "TextureUsage",
                bits: 0x20
            })
        );
        assert_eq!(
            from_bytes::<BufferUsage>(&0x8000_0401u32.to_le_bytes()),
            Err(WireError::UnknownFlags {
                ty: "BufferUsage",
                bits: 0x8000_0400
            })
        );
        assert_eq!(
            from_bytes::<BufferUsage>(&0x03ffu32.to_le_bytes()),
            Ok(BufferUsage::all())
        );
    }

    #[test]
    fn binding_resource_arms() {
        let entries = vec![
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer: id(2),
                    offset: 256,
                    size: None,
                },
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::TextureView { view: id(3) },
            },
        ];
        let descriptor = BindGroupDescriptor {
            label: None,
            entries,
        };
        assert_eq!(
            from_bytes::<BindGroupDescriptor>(&to_bytes(&descriptor)),
            Ok(descriptor)
        );
    }
}
