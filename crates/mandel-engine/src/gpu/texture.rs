use std::fmt;
use std::sync::mpsc::channel;

use crate::device::GpuContext;

use super::handle::Handle;

// ── formats ───────────────────────────────────────────────────────────────

/// Storage format of a texture, fixed at construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgba8,
    Rgba8Srgb,
    Depth24Stencil8,
}

impl InternalFormat {
    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            InternalFormat::R8 => wgpu::TextureFormat::R8Unorm,
            InternalFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
            InternalFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            InternalFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            InternalFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }

    /// Bytes per texel as stored (color formats only).
    pub fn channels(self) -> usize {
        match self {
            InternalFormat::R8 => 1,
            InternalFormat::Rg8 => 2,
            InternalFormat::Rgba8 | InternalFormat::Rgba8Srgb => 4,
            InternalFormat::Depth24Stencil8 => 0,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, InternalFormat::Depth24Stencil8)
    }

    fn usage(self) -> wgpu::TextureUsages {
        if self.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        }
    }
}

/// Channel layout of client pixel data handed to [`Texture::set_pixels`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
    DepthStencil,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Red => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
            PixelFormat::DepthStencil => 1,
        }
    }
}

/// Component type of client pixel data.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelType {
    UnsignedByte,
    Float,
    UnsignedInt24_8,
}

impl PixelType {
    pub fn size(self) -> usize {
        match self {
            PixelType::UnsignedByte => 1,
            PixelType::Float | PixelType::UnsignedInt24_8 => 4,
        }
    }
}

/// Vertical order of the stored rows.
///
/// Client uploads arrive bottom row first. Render attachments are written top
/// row first. The compositor flips sampling for `BottomUp` textures.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RowOrigin {
    BottomUp,
    TopDown,
}

// ── swizzle ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SwizzleSource {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

/// Per-channel source selection applied when the texture is sampled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Swizzle(pub [SwizzleSource; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Green,
        SwizzleSource::Blue,
        SwizzleSource::Alpha,
    ]);

    /// Single-channel coverage shown as opaque grey.
    pub const LUMINANCE: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::Red,
        SwizzleSource::One,
    ]);

    /// Color with alpha forced to one.
    pub const OPAQUE: Swizzle = Swizzle([
        SwizzleSource::Red,
        SwizzleSource::Green,
        SwizzleSource::Blue,
        SwizzleSource::One,
    ]);

    /// Indices into `[r, g, b, a, 0, 1]`, as consumed by the blit shader.
    pub(crate) fn indices(self) -> [u32; 4] {
        self.0.map(|s| match s {
            SwizzleSource::Red => 0,
            SwizzleSource::Green => 1,
            SwizzleSource::Blue => 2,
            SwizzleSource::Alpha => 3,
            SwizzleSource::Zero => 4,
            SwizzleSource::One => 5,
        })
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Swizzle::IDENTITY
    }
}

// ── upload conversion ─────────────────────────────────────────────────────

/// Reasons a client upload is refused.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UploadError {
    DepthUpload,
    Unsupported { format: PixelFormat, ty: PixelType },
    DataTooShort { expected: usize, actual: usize },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::DepthUpload => {
                write!(f, "depth/stencil textures cannot be filled from client memory")
            }
            UploadError::Unsupported { format, ty } => {
                write!(f, "unsupported pixel layout {format:?}/{ty:?}")
            }
            UploadError::DataTooShort { expected, actual } => {
                write!(f, "pixel data too short: expected {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for UploadError {}

/// Rounds `n` up to the next multiple of four.
#[inline]
pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Repacks client pixels into tightly packed rows of `dst`.
///
/// Source rows are padded to four bytes. Channels missing from the source
/// become 0, except alpha which becomes 255. Float components are clamped to
/// [0, 1]. Row order is preserved.
pub(crate) fn convert_pixels(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    ty: PixelType,
    dst: InternalFormat,
) -> Result<Vec<u8>, UploadError> {
    if dst.is_depth() {
        return Err(UploadError::DepthUpload);
    }
    if format == PixelFormat::DepthStencil || ty == PixelType::UnsignedInt24_8 {
        return Err(UploadError::Unsupported { format, ty });
    }

    let (w, h) = (width as usize, height as usize);
    let src_channels = format.channels();
    let src_px = src_channels * ty.size();
    let src_row = align4(w * src_px);
    let expected = src_row * h;
    if data.len() < expected {
        return Err(UploadError::DataTooShort { expected, actual: data.len() });
    }

    let dst_channels = dst.channels();
    let mut out = Vec::with_capacity(w * h * dst_channels);

    for row in data.chunks_exact(src_row).take(h) {
        for px in row[..w * src_px].chunks_exact(src_px) {
            for c in 0..dst_channels {
                let v = if c < src_channels {
                    read_component(px, c, ty)
                } else if c == 3 {
                    255
                } else {
                    0
                };
                out.push(v);
            }
        }
    }

    Ok(out)
}

fn read_component(px: &[u8], channel: usize, ty: PixelType) -> u8 {
    match ty {
        PixelType::UnsignedByte => px[channel],
        PixelType::Float => {
            let at = channel * 4;
            let v = f32::from_ne_bytes([px[at], px[at + 1], px[at + 2], px[at + 3]]);
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        PixelType::UnsignedInt24_8 => 0,
    }
}

/// Number of levels in a full mip chain for a `width` × `height` image.
pub(crate) fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

// ── texture ───────────────────────────────────────────────────────────────

struct RawTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Owner of one 2D texture.
///
/// Storage is (re)allocated by [`Texture::set_pixels`]; width and height stay
/// zero until the first upload. Not `Clone`. `std::mem::take` leaves an empty
/// texture behind whose drop releases nothing.
pub struct Texture {
    handle: Handle,
    format: InternalFormat,
    width: u32,
    height: u32,
    origin: RowOrigin,
    swizzle: Swizzle,
    revision: u64,
    raw: Option<RawTexture>,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            handle: Handle::NONE,
            format: InternalFormat::Rgba8,
            width: 0,
            height: 0,
            origin: RowOrigin::BottomUp,
            swizzle: Swizzle::IDENTITY,
            revision: 0,
            raw: None,
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("revision", &self.revision)
            .finish()
    }
}

impl Texture {
    pub fn new(format: InternalFormat) -> Self {
        Self {
            handle: Handle::allocate(),
            format,
            width: 0,
            height: 0,
            origin: RowOrigin::BottomUp,
            swizzle: Swizzle::IDENTITY,
            revision: 0,
            raw: None,
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> InternalFormat {
        self.format
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn row_origin(&self) -> RowOrigin {
        self.origin
    }

    #[inline]
    pub fn swizzle(&self) -> Swizzle {
        self.swizzle
    }

    pub fn set_swizzle(&mut self, swizzle: Swizzle) {
        self.swizzle = swizzle;
    }

    /// Increments every time storage is reallocated or released.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mip_level_count(&self) -> u32 {
        self.raw.as_ref().map_or(0, |r| r.texture.mip_level_count())
    }

    pub(crate) fn set_row_origin(&mut self, origin: RowOrigin) {
        self.origin = origin;
    }

    pub(crate) fn view(&self) -> Option<&wgpu::TextureView> {
        self.raw.as_ref().map(|r| &r.view)
    }

    /// (Re)allocates storage at `width` × `height` and optionally uploads `data`.
    ///
    /// `data` rows run bottom to top, each padded to a multiple of four bytes,
    /// laid out as `format`/`ty`. `None` allocates zeroed storage. A zero
    /// dimension releases storage. Rejected uploads are logged and leave the
    /// texture untouched.
    pub fn set_pixels(
        &mut self,
        ctx: &GpuContext,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        data: Option<&[u8]>,
    ) {
        if self.handle.is_none() {
            log::error!("set_pixels: texture has no GPU object (default-constructed or moved-from)");
            return;
        }

        if width == 0 || height == 0 {
            self.release();
            self.width = 0;
            self.height = 0;
            self.revision += 1;
            return;
        }

        let max = ctx.max_texture_size();
        if width > max || height > max {
            log::error!(
                "set_pixels: {width}x{height} exceeds the device limit of {max} on texture {}",
                self.handle
            );
            return;
        }

        let packed = match data {
            Some(bytes) => {
                match convert_pixels(bytes, width, height, format, ty, self.format) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::error!("set_pixels on texture {}: {e}", self.handle);
                        return;
                    }
                }
            }
            None => None,
        };

        let raw = self.allocate(ctx, width, height, 1);

        if let Some(pixels) = packed {
            ctx.queue().write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &raw.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * self.format.channels() as u32),
                    rows_per_image: Some(height),
                },
                extent(width, height),
            );
        }

        self.release();
        self.raw = Some(raw);
        self.width = width;
        self.height = height;
        self.origin = RowOrigin::BottomUp;
        self.revision += 1;
    }

    /// Fills every level below 0 by successive downsampling of level 0.
    ///
    /// Storage created with a single level is promoted to a full chain first.
    pub fn generate_mipmap(&mut self, ctx: &GpuContext) {
        if self.format.is_depth() {
            log::warn!("generate_mipmap: depth texture {} has no mip chain", self.handle);
            return;
        }
        let Some(current) = self.raw.as_ref() else {
            log::warn!("generate_mipmap: texture {} has no storage", self.handle);
            return;
        };

        let levels = full_mip_chain(self.width, self.height);
        if levels < 2 {
            return;
        }

        let mut encoder = ctx.create_encoder("mandel mipmap encoder");

        if current.texture.mip_level_count() < levels {
            let promoted = self.allocate(ctx, self.width, self.height, levels);
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &current.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &promoted.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                extent(self.width, self.height),
            );
            ctx.mipmaps().generate(ctx.device(), &mut encoder, &promoted.texture);
            ctx.submit(encoder);

            self.release();
            self.raw = Some(promoted);
            self.revision += 1;
        } else {
            ctx.mipmaps().generate(ctx.device(), &mut encoder, &current.texture);
            ctx.submit(encoder);
        }
    }

    /// Reads level 0 back in storage row order, tightly packed.
    ///
    /// Returns `None` for depth textures, empty textures, or a failed map.
    pub fn read_pixels(&self, ctx: &GpuContext) -> Option<Vec<u8>> {
        if self.format.is_depth() {
            return None;
        }
        let raw = self.raw.as_ref()?;

        let row_bytes = self.width * self.format.channels() as u32;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = row_bytes.div_ceil(align) * align;

        let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("mandel readback buffer"),
            size: u64::from(padded) * u64::from(self.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx.create_encoder("mandel readback encoder");
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &raw.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            extent(self.width, self.height),
        );
        ctx.submit(encoder);

        let slice = buffer.slice(..);
        let (sender, receiver) = channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            drop(sender.send(res));
        });
        if let Err(e) = ctx.device().poll(wgpu::PollType::wait_indefinitely()) {
            log::error!("read_pixels: device poll failed on texture {}: {e}", self.handle);
            return None;
        }
        let Ok(mapped) = receiver.try_recv() else {
            log::error!("read_pixels: map of texture {} did not complete", self.handle);
            return None;
        };
        if let Err(e) = mapped {
            log::error!("read_pixels: map failed on texture {}: {e}", self.handle);
            return None;
        }

        let view = slice.get_mapped_range();
        let mut out = Vec::with_capacity((row_bytes * self.height) as usize);
        for row in view.chunks(padded as usize).take(self.height as usize) {
            out.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(view);
        buffer.unmap();
        Some(out)
    }

    fn allocate(&self, ctx: &GpuContext, width: u32, height: u32, levels: u32) -> RawTexture {
        let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("mandel texture"),
            size: extent(width, height),
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format.wgpu_format(),
            usage: self.format.usage(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        RawTexture { texture, view }
    }

    fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            raw.texture.destroy();
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;

    // ── conversion ─────────────────────────────────────────────────────────

    #[test]
    fn rgb_rows_are_unpadded_and_alpha_filled() {
        // 1x2 RGB: each 3-byte row padded to 4.
        let src = [10, 20, 30, 0, 40, 50, 60, 0];
        let out = convert_pixels(&src, 1, 2, PixelFormat::Rgb, PixelType::UnsignedByte, InternalFormat::Rgba8)
            .unwrap();
        assert_eq!(out, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn red_into_rgba_zeroes_green_and_blue() {
        let src = [200, 0, 0, 0];
        let out = convert_pixels(&src, 1, 1, PixelFormat::Red, PixelType::UnsignedByte, InternalFormat::Rgba8)
            .unwrap();
        assert_eq!(out, vec![200, 0, 0, 255]);
    }

    #[test]
    fn rgba_into_r8_keeps_red() {
        let src = [7, 8, 9, 10, 11, 12, 13, 14];
        let out = convert_pixels(&src, 2, 1, PixelFormat::Rgba, PixelType::UnsignedByte, InternalFormat::R8)
            .unwrap();
        assert_eq!(out, vec![7, 11]);
    }

    #[test]
    fn float_components_are_clamped() {
        let mut src = Vec::new();
        for v in [-1.0f32, 0.5, 2.0] {
            src.extend_from_slice(&v.to_ne_bytes());
        }
        let out = convert_pixels(&src, 1, 1, PixelFormat::Rgb, PixelType::Float, InternalFormat::Rgba8)
            .unwrap();
        assert_eq!(out, vec![0, 128, 255, 255]);
    }

    #[test]
    fn short_data_is_rejected() {
        let err = convert_pixels(&[0; 7], 3, 2, PixelFormat::Red, PixelType::UnsignedByte, InternalFormat::R8)
            .unwrap_err();
        assert_eq!(err, UploadError::DataTooShort { expected: 8, actual: 7 });
    }

    #[test]
    fn depth_upload_is_rejected() {
        let err = convert_pixels(
            &[0; 4],
            1,
            1,
            PixelFormat::DepthStencil,
            PixelType::UnsignedInt24_8,
            InternalFormat::Depth24Stencil8,
        )
        .unwrap_err();
        assert_eq!(err, UploadError::DepthUpload);
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(full_mip_chain(1, 1), 1);
        assert_eq!(full_mip_chain(2, 1), 2);
        assert_eq!(full_mip_chain(100, 17), 7);
        assert_eq!(full_mip_chain(256, 256), 9);
    }

    #[test]
    fn swizzle_indices() {
        assert_eq!(Swizzle::LUMINANCE.indices(), [0, 0, 0, 5]);
        assert_eq!(Swizzle::IDENTITY.indices(), [0, 1, 2, 3]);
    }

    // ── ownership ──────────────────────────────────────────────────────────

    #[test]
    fn moved_from_texture_owns_nothing() {
        let mut tex = Texture::new(InternalFormat::R8);
        let handle = tex.handle();
        assert!(!handle.is_none());

        let moved = std::mem::take(&mut tex);
        assert_eq!(moved.handle(), handle);
        assert!(tex.handle().is_none());
        assert_eq!(tex.width(), 0);
    }

    // ── GPU ────────────────────────────────────────────────────────────────

    #[test]
    fn upload_sets_dimensions_and_reads_back() {
        let Some(ctx) = test_context() else { return };
        let mut tex = Texture::new(InternalFormat::R8);
        // 3x2 red, rows padded to 4 bytes.
        let src = [1, 2, 3, 0, 4, 5, 6, 0];
        tex.set_pixels(&ctx, 3, 2, PixelFormat::Red, PixelType::UnsignedByte, Some(&src));

        assert_eq!((tex.width(), tex.height()), (3, 2));
        assert_eq!(tex.row_origin(), RowOrigin::BottomUp);
        assert_eq!(tex.read_pixels(&ctx), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn default_texture_ignores_uploads() {
        let Some(ctx) = test_context() else { return };
        let mut tex = Texture::default();
        tex.set_pixels(&ctx, 4, 4, PixelFormat::Rgba, PixelType::UnsignedByte, None);
        assert_eq!(tex.width(), 0);
        assert_eq!(tex.revision(), 0);
    }

    #[test]
    fn mipmap_promotes_to_full_chain() {
        let Some(ctx) = test_context() else { return };
        let mut tex = Texture::new(InternalFormat::R8);
        let src = vec![255u8; 8 * 4];
        tex.set_pixels(&ctx, 8, 4, PixelFormat::Red, PixelType::UnsignedByte, Some(&src));
        assert_eq!(tex.mip_level_count(), 1);

        tex.generate_mipmap(&ctx);
        assert_eq!(tex.mip_level_count(), 4);
        assert_eq!(tex.read_pixels(&ctx), Some(src));
    }

    #[test]
    fn zero_size_releases_storage() {
        let Some(ctx) = test_context() else { return };
        let mut tex = Texture::new(InternalFormat::Rgba8);
        tex.set_pixels(&ctx, 2, 2, PixelFormat::Rgba, PixelType::UnsignedByte, None);
        tex.set_pixels(&ctx, 0, 2, PixelFormat::Rgba, PixelType::UnsignedByte, None);
        assert_eq!(tex.width(), 0);
        assert!(tex.read_pixels(&ctx).is_none());
    }
}
