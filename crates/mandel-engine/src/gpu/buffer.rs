use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::device::GpuContext;

use super::handle::Handle;

/// Vertex strides must be a multiple of this many bytes.
const STRIDE_ALIGNMENT: u32 = 4;

// ── attribute type table ──────────────────────────────────────────────────

/// Component type of one vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttribType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    HalfFloat,
    Int,
    UnsignedInt,
    Float,
    Double,
    Fixed,
    Int2101010Rev,
    UnsignedInt2101010Rev,
    UnsignedInt10F11F11FRev,
}

/// How the shader receives an attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UploadStrategy {
    /// Integer components stay integers.
    Integer,
    /// Components are converted to 32-bit floats.
    Float,
    /// 64-bit float components.
    Double,
}

impl AttribType {
    /// Byte width of one component (of the whole value for packed types).
    pub fn width(self) -> u32 {
        match self {
            AttribType::Byte | AttribType::UnsignedByte => 1,
            AttribType::Short | AttribType::UnsignedShort | AttribType::HalfFloat => 2,
            AttribType::Int
            | AttribType::UnsignedInt
            | AttribType::Float
            | AttribType::Fixed
            | AttribType::Int2101010Rev
            | AttribType::UnsignedInt2101010Rev
            | AttribType::UnsignedInt10F11F11FRev => 4,
            AttribType::Double => 8,
        }
    }

    pub fn strategy(self) -> UploadStrategy {
        match self {
            AttribType::Byte
            | AttribType::UnsignedByte
            | AttribType::Short
            | AttribType::UnsignedShort
            | AttribType::Int
            | AttribType::UnsignedInt => UploadStrategy::Integer,
            AttribType::Double => UploadStrategy::Double,
            AttribType::HalfFloat
            | AttribType::Float
            | AttribType::Fixed
            | AttribType::Int2101010Rev
            | AttribType::UnsignedInt2101010Rev
            | AttribType::UnsignedInt10F11F11FRev => UploadStrategy::Float,
        }
    }

    /// Packed types hold every component in one `width()`-byte word.
    pub fn is_packed(self) -> bool {
        matches!(
            self,
            AttribType::Int2101010Rev
                | AttribType::UnsignedInt2101010Rev
                | AttribType::UnsignedInt10F11F11FRev
        )
    }

    /// Bytes occupied by an attribute of `count` components.
    pub fn attrib_size(self, count: u32) -> u32 {
        if self.is_packed() { self.width() } else { count * self.width() }
    }

    /// Vertex format for `count` components, if the pipeline can express it.
    pub fn vertex_format(self, count: u32) -> Option<wgpu::VertexFormat> {
        use wgpu::VertexFormat as F;

        let format = match (self, count) {
            (AttribType::Byte, 1) => F::Sint8,
            (AttribType::Byte, 2) => F::Sint8x2,
            (AttribType::Byte, 4) => F::Sint8x4,
            (AttribType::UnsignedByte, 1) => F::Uint8,
            (AttribType::UnsignedByte, 2) => F::Uint8x2,
            (AttribType::UnsignedByte, 4) => F::Uint8x4,
            (AttribType::Short, 1) => F::Sint16,
            (AttribType::Short, 2) => F::Sint16x2,
            (AttribType::Short, 4) => F::Sint16x4,
            (AttribType::UnsignedShort, 1) => F::Uint16,
            (AttribType::UnsignedShort, 2) => F::Uint16x2,
            (AttribType::UnsignedShort, 4) => F::Uint16x4,
            (AttribType::HalfFloat, 1) => F::Float16,
            (AttribType::HalfFloat, 2) => F::Float16x2,
            (AttribType::HalfFloat, 4) => F::Float16x4,
            (AttribType::Int, 1) => F::Sint32,
            (AttribType::Int, 2) => F::Sint32x2,
            (AttribType::Int, 3) => F::Sint32x3,
            (AttribType::Int, 4) => F::Sint32x4,
            (AttribType::UnsignedInt, 1) => F::Uint32,
            (AttribType::UnsignedInt, 2) => F::Uint32x2,
            (AttribType::UnsignedInt, 3) => F::Uint32x3,
            (AttribType::UnsignedInt, 4) => F::Uint32x4,
            (AttribType::Float, 1) => F::Float32,
            (AttribType::Float, 2) => F::Float32x2,
            (AttribType::Float, 3) => F::Float32x3,
            (AttribType::Float, 4) => F::Float32x4,
            (AttribType::Double, 1) => F::Float64,
            (AttribType::Double, 2) => F::Float64x2,
            (AttribType::Double, 3) => F::Float64x3,
            (AttribType::Double, 4) => F::Float64x4,
            (AttribType::UnsignedInt2101010Rev, 4) => F::Unorm10_10_10_2,
            _ => return None,
        };
        Some(format)
    }
}

/// Expected update frequency of a buffer's contents.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Written once. Every upload allocates a new buffer.
    Static,
    /// Rewritten occasionally. Same-sized uploads reuse the buffer.
    Dynamic,
    /// Rewritten every frame. Same-sized uploads reuse the buffer.
    Stream,
}

/// One declared attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttrib {
    pub slot: u32,
    pub offset: u32,
    pub count: u32,
    pub ty: AttribType,
    pub format: wgpu::VertexFormat,
}

// ── vertex buffer ─────────────────────────────────────────────────────────

/// Owner of one vertex buffer plus its attribute layout.
///
/// Attributes are declared in order; each lands in the next slot at the
/// current byte offset.
pub struct VertexBuffer {
    handle: Handle,
    stride: u32,
    divisor: u32,
    next_slot: u32,
    next_offset: u32,
    attribs: Vec<VertexAttrib>,
    count: u32,
    raw: Option<wgpu::Buffer>,
}

impl Default for VertexBuffer {
    fn default() -> Self {
        Self {
            handle: Handle::NONE,
            stride: 0,
            divisor: 0,
            next_slot: 0,
            next_offset: 0,
            attribs: Vec::new(),
            count: 0,
            raw: None,
        }
    }
}

impl VertexBuffer {
    /// `stride` is the byte distance between elements. A non-zero `divisor`
    /// advances the buffer per instance instead of per vertex.
    pub fn new(stride: u32, divisor: u32) -> Self {
        if divisor > 1 {
            log::warn!("vertex divisor {divisor} unsupported; advancing once per instance");
        }
        Self {
            handle: Handle::allocate(),
            stride,
            divisor,
            next_slot: 0,
            next_offset: 0,
            attribs: Vec::new(),
            count: 0,
            raw: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Number of elements uploaded by the last `bind_data`.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn attribs(&self) -> &[VertexAttrib] {
        &self.attribs
    }

    /// Byte offset the next attribute will be placed at.
    #[inline]
    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }

    pub fn is_instanced(&self) -> bool {
        self.divisor > 0
    }

    /// Declares the next attribute: `count` components of `ty`.
    ///
    /// Combinations with no vertex format, and offsets the pipeline cannot
    /// address, are logged and leave the layout unchanged.
    pub fn add_attrib(&mut self, count: u32, ty: AttribType) {
        let Some(format) = ty.vertex_format(count) else {
            log::error!("unknown vertex attribute type: {count} x {ty:?}");
            return;
        };

        let align = format.size().min(4) as u32;
        if self.next_offset % align != 0 {
            log::error!(
                "vertex attribute {count} x {ty:?} at offset {} is not {align}-byte aligned",
                self.next_offset
            );
            return;
        }

        self.attribs.push(VertexAttrib {
            slot: self.next_slot,
            offset: self.next_offset,
            count,
            ty,
            format,
        });
        self.next_slot += 1;
        self.next_offset += ty.attrib_size(count);
    }

    /// Replaces the buffer contents with the first `count` elements of `data`.
    pub fn bind_data<T: Pod>(&mut self, ctx: &GpuContext, data: &[T], count: u32, usage: BufferUsage) {
        if self.handle.is_none() {
            log::error!("bind_data: vertex buffer has no GPU object");
            return;
        }
        if self.stride == 0 {
            log::error!("bind_data: vertex buffer {} has zero stride", self.handle);
            return;
        }

        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = count as usize * self.stride as usize;
        if bytes.len() < needed {
            log::error!(
                "bind_data: {count} elements of {} bytes need {needed} bytes, got {}",
                self.stride,
                bytes.len()
            );
            return;
        }
        let bytes = &bytes[..needed];

        let reusable = usage != BufferUsage::Static
            && needed % wgpu::COPY_BUFFER_ALIGNMENT as usize == 0
            && self.raw.as_ref().is_some_and(|b| b.size() == needed as u64);

        if reusable {
            if let Some(buffer) = self.raw.as_ref() {
                ctx.queue().write_buffer(buffer, 0, bytes);
            }
        } else {
            let buffer = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mandel vertex buffer"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
            self.release();
            self.raw = Some(buffer);
        }
        self.count = count;
    }

    /// Checks the declared layout against the stride.
    pub fn validate(&self) -> Result<(), String> {
        if self.stride % STRIDE_ALIGNMENT != 0 {
            return Err(format!(
                "stride {} is not a multiple of {STRIDE_ALIGNMENT}",
                self.stride
            ));
        }
        for a in &self.attribs {
            let end = a.offset + a.format.size() as u32;
            if end > self.stride {
                return Err(format!(
                    "attribute {} ends at byte {end}, past the stride of {}",
                    a.slot, self.stride
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn step_mode(&self) -> wgpu::VertexStepMode {
        if self.is_instanced() {
            wgpu::VertexStepMode::Instance
        } else {
            wgpu::VertexStepMode::Vertex
        }
    }

    /// Attributes with shader locations starting at `base_location`.
    pub(crate) fn wgpu_attributes(&self, base_location: u32) -> Vec<wgpu::VertexAttribute> {
        self.attribs
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format,
                offset: u64::from(a.offset),
                shader_location: base_location + a.slot,
            })
            .collect()
    }

    pub(crate) fn raw(&self) -> Option<&wgpu::Buffer> {
        self.raw.as_ref()
    }

    fn release(&mut self) {
        if let Some(buffer) = self.raw.take() {
            buffer.destroy();
        }
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
