use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::device::GpuContext;
use crate::device::fatal::{terminate, FatalError};
use crate::gpu::{
    DrawState, Handle, InternalFormat, PixelFormat, PixelType, Program, RowOrigin, Swizzle, Texture,
    VertexArray,
};

use super::compositor::Compositor;

// ── completeness ──────────────────────────────────────────────────────────

/// Result of validating a target's attachment set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramebufferStatus {
    Complete,
    /// The target has never been sized.
    Undefined,
    /// An attachment has no storage or an unusable format.
    IncompleteAttachment,
    MissingAttachment,
    /// Attachment sizes disagree with the target or exceed the device limit.
    IncompleteDimensions,
    IncompleteMultisample,
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FramebufferStatus::Complete => "complete",
            FramebufferStatus::Undefined => "undefined",
            FramebufferStatus::IncompleteAttachment => "incomplete attachment",
            FramebufferStatus::MissingAttachment => "missing attachment",
            FramebufferStatus::IncompleteDimensions => "attachment dimensions mismatch or exceed device limits",
            FramebufferStatus::IncompleteMultisample => "multisample count mismatch",
        };
        f.write_str(s)
    }
}

/// What validation needs to know about one attachment.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct AttachmentInfo {
    pub width: u32,
    pub height: u32,
    pub depth: bool,
    pub samples: u32,
}

pub(crate) fn classify(
    size: (i32, i32),
    color: Option<AttachmentInfo>,
    depth_stencil: Option<AttachmentInfo>,
    max_size: u32,
) -> FramebufferStatus {
    let (w, h) = size;
    if w <= 0 || h <= 0 {
        return FramebufferStatus::Undefined;
    }
    let (Some(color), Some(depth_stencil)) = (color, depth_stencil) else {
        return FramebufferStatus::MissingAttachment;
    };
    if color.depth || !depth_stencil.depth {
        return FramebufferStatus::IncompleteAttachment;
    }
    for a in [color, depth_stencil] {
        if a.width == 0 || a.height == 0 {
            return FramebufferStatus::IncompleteAttachment;
        }
        if a.width != w as u32 || a.height != h as u32 || a.width > max_size || a.height > max_size {
            return FramebufferStatus::IncompleteDimensions;
        }
    }
    if color.samples != depth_stencil.samples {
        return FramebufferStatus::IncompleteMultisample;
    }
    FramebufferStatus::Complete
}

fn attachment(texture: &Texture) -> Option<AttachmentInfo> {
    texture.view()?;
    Some(AttachmentInfo {
        width: texture.width(),
        height: texture.height(),
        depth: texture.format().is_depth(),
        samples: 1,
    })
}

// ── target ────────────────────────────────────────────────────────────────

/// How a pass treats existing attachment contents.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadAction {
    Load,
    /// Color to transparent black, depth to 1, stencil to 0.
    Clear,
}

/// Color + depth/stencil attachment pair that draws land in.
///
/// Offscreen targets own both attachments and are validated on every resize.
/// The on-screen target (handle `NONE`) borrows the surface texture for one
/// frame at a time and is sized by the window.
pub struct RenderTarget {
    fbo: Handle,
    width: i32,
    height: i32,
    color: Texture,
    depth_stencil: Texture,
    surface: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    compositor: Rc<Compositor>,
}

impl RenderTarget {
    /// Creates an offscreen target and sizes it to `width` × `height`.
    pub fn new(ctx: &GpuContext, width: i32, height: i32) -> Self {
        let mut target = Self {
            fbo: Handle::allocate(),
            width: -1,
            height: -1,
            color: Texture::new(InternalFormat::Rgba8),
            depth_stencil: Texture::new(InternalFormat::Depth24Stencil8),
            surface: None,
            compositor: ctx.compositor(),
        };
        target.resize(ctx, width, height);
        target
    }

    /// On-screen target. Only the device layer creates these.
    pub(crate) fn screen(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let mut target = Self {
            fbo: Handle::NONE,
            width: width as i32,
            height: height as i32,
            color: Texture::default(),
            depth_stencil: Texture::new(InternalFormat::Depth24Stencil8),
            surface: None,
            compositor: ctx.compositor(),
        };
        target.resize_screen(ctx, width, height);
        target
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.fbo
    }

    #[inline]
    pub fn is_screen(&self) -> bool {
        self.fbo.is_none()
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn color_texture(&self) -> &Texture {
        &self.color
    }

    pub fn depth_stencil_texture(&self) -> &Texture {
        &self.depth_stencil
    }

    pub fn compositor(&self) -> &Rc<Compositor> {
        &self.compositor
    }

    /// Reallocates both attachments at `width` × `height`.
    ///
    /// Unchanged sizes are a no-op. Non-positive sizes are logged and
    /// ignored. An incomplete result terminates the process.
    pub fn resize(&mut self, ctx: &GpuContext, width: i32, height: i32) {
        if self.is_screen() {
            log::warn!("the on-screen target is sized by its window");
            return;
        }
        if width == self.width && height == self.height {
            return;
        }
        if width <= 0 || height <= 0 {
            log::error!("render target {}: invalid size {width}x{height}", self.fbo);
            return;
        }

        let (w, h) = (width as u32, height as u32);
        self.color
            .set_pixels(ctx, w, h, PixelFormat::Rgba, PixelType::UnsignedByte, None);
        self.color.set_row_origin(RowOrigin::TopDown);
        self.color.set_swizzle(Swizzle::OPAQUE);

        self.depth_stencil
            .set_pixels(ctx, w, h, PixelFormat::DepthStencil, PixelType::UnsignedInt24_8, None);
        self.depth_stencil.set_row_origin(RowOrigin::TopDown);

        self.width = width;
        self.height = height;

        let status = self.status(ctx);
        if status != FramebufferStatus::Complete {
            terminate(FatalError::IncompleteFramebuffer {
                reason: format!("render target {} at {width}x{height}: {status}", self.fbo),
            });
        }
        log::debug!("render target {} resized to {width}x{height}", self.fbo);
    }

    /// Validates the attachment set. The on-screen target is always complete.
    pub fn status(&self, ctx: &GpuContext) -> FramebufferStatus {
        if self.is_screen() {
            return FramebufferStatus::Complete;
        }
        classify(
            (self.width, self.height),
            attachment(&self.color),
            attachment(&self.depth_stencil),
            ctx.max_texture_size(),
        )
    }

    pub(crate) fn resize_screen(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.depth_stencil
            .set_pixels(ctx, width, height, PixelFormat::DepthStencil, PixelType::UnsignedInt24_8, None);
        self.depth_stencil.set_row_origin(RowOrigin::TopDown);
        self.width = width as i32;
        self.height = height as i32;
    }

    pub(crate) fn attach_surface(&mut self, view: wgpu::TextureView, format: wgpu::TextureFormat) {
        self.surface = Some((view, format));
    }

    pub(crate) fn detach_surface(&mut self) {
        self.surface = None;
    }

    fn color_target(&self) -> Option<(&wgpu::TextureView, wgpu::TextureFormat)> {
        if self.is_screen() {
            self.surface.as_ref().map(|(v, f)| (v, *f))
        } else {
            self.color.view().map(|v| (v, self.color.format().wgpu_format()))
        }
    }

    /// Begins a pass on this target with the viewport covering it.
    ///
    /// Returns `None` while the target has no drawable attachments.
    pub fn bind<'e>(&self, encoder: &'e mut wgpu::CommandEncoder, load: LoadAction) -> Option<wgpu::RenderPass<'e>> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let (color_view, _) = self.color_target()?;
        let depth_view = self.depth_stencil.view()?;

        let (color_load, depth_load, stencil_load) = match load {
            LoadAction::Load => (wgpu::LoadOp::Load, wgpu::LoadOp::Load, wgpu::LoadOp::Load),
            LoadAction::Clear => (
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                wgpu::LoadOp::Clear(1.0),
                wgpu::LoadOp::Clear(0),
            ),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("mandel target pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: stencil_load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
        Some(pass)
    }

    /// Clears color to transparent black, depth to 1 and stencil to 0.
    pub fn clear(&self, ctx: &GpuContext) {
        let mut encoder = ctx.create_encoder("mandel clear encoder");
        if self.bind(&mut encoder, LoadAction::Clear).is_none() {
            log::debug!("clear: render target {} has nothing to clear", self.fbo);
            return;
        }
        ctx.submit(encoder);
    }

    /// Draws `vertices` in `range` with `program`, sampling `textures` by unit.
    ///
    /// Every binding is re-established for this draw. Invalid inputs are
    /// logged and the draw is skipped.
    pub fn draw(
        &self,
        ctx: &GpuContext,
        program: &Program,
        vertices: &VertexArray,
        textures: &[&Texture],
        state: DrawState,
        range: Range<u32>,
    ) {
        let Some((_, color_format)) = self.color_target() else {
            log::warn!("draw: render target {} has no color attachment", self.fbo);
            return;
        };
        if let Err(e) = vertices.validate().and_then(|_| program.check_vertex_inputs(vertices)) {
            log::error!("draw with program {}: {e}", program.handle());
            return;
        }
        if range.end > vertices.vertex_count() {
            log::error!(
                "draw: vertices {range:?} out of bounds ({} available)",
                vertices.vertex_count()
            );
            return;
        }

        program.flush_uniforms(ctx);
        let bind_group = match program.bind_group(ctx, textures) {
            Ok(bg) => bg,
            Err(e) => {
                log::error!("draw with program {}: {e}", program.handle());
                return;
            }
        };
        let depth_format = Some(self.depth_stencil.format().wgpu_format());
        let Some(pipeline) = program.pipeline(ctx, color_format, depth_format, state, vertices) else {
            return;
        };

        let mut encoder = ctx.create_encoder("mandel draw encoder");
        {
            let Some(mut pass) = self.bind(&mut encoder, LoadAction::Load) else {
                return;
            };
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            vertices.bind(&mut pass);
            pass.draw(range, 0..vertices.instance_count());
        }
        ctx.submit(encoder);
    }

    /// Composites `texture` over `[x, x + w) × [y, y + h)` at depth `z`.
    ///
    /// Pixel coordinates have their origin at the top-left corner. `z` lies in
    /// `[-1, 1]`; smaller values are nearer.
    pub fn render_texture(&self, ctx: &GpuContext, texture: &Texture, x: i32, y: i32, w: i32, h: i32, z: f32) {
        let compositor = Rc::clone(&self.compositor);
        compositor.render(ctx, self, texture, [x, y, w, h], z);
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTarget")
            .field("fbo", &self.fbo)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fatal::{child_exit_code, is_fatal_child};
    use crate::device::test_context;

    fn info(width: u32, height: u32, depth: bool) -> Option<AttachmentInfo> {
        Some(AttachmentInfo { width, height, depth, samples: 1 })
    }

    // ── classification ─────────────────────────────────────────────────────

    #[test]
    fn matching_attachments_are_complete() {
        let s = classify((64, 32), info(64, 32, false), info(64, 32, true), 8192);
        assert_eq!(s, FramebufferStatus::Complete);
    }

    #[test]
    fn unsized_target_is_undefined() {
        let s = classify((-1, -1), info(1, 1, false), info(1, 1, true), 8192);
        assert_eq!(s, FramebufferStatus::Undefined);
    }

    #[test]
    fn missing_depth_is_reported() {
        let s = classify((4, 4), info(4, 4, false), None, 8192);
        assert_eq!(s, FramebufferStatus::MissingAttachment);
    }

    #[test]
    fn swapped_attachment_kinds_are_incomplete() {
        let s = classify((4, 4), info(4, 4, true), info(4, 4, true), 8192);
        assert_eq!(s, FramebufferStatus::IncompleteAttachment);
    }

    #[test]
    fn size_mismatch_and_limit_are_dimension_errors() {
        let s = classify((4, 4), info(4, 4, false), info(8, 4, true), 8192);
        assert_eq!(s, FramebufferStatus::IncompleteDimensions);
        let s = classify((9000, 4), info(9000, 4, false), info(9000, 4, true), 8192);
        assert_eq!(s, FramebufferStatus::IncompleteDimensions);
    }

    #[test]
    fn sample_mismatch_is_multisample_error() {
        let mut depth = info(4, 4, true);
        if let Some(d) = depth.as_mut() {
            d.samples = 4;
        }
        let s = classify((4, 4), info(4, 4, false), depth, 8192);
        assert_eq!(s, FramebufferStatus::IncompleteMultisample);
    }

    // ── GPU ────────────────────────────────────────────────────────────────

    #[test]
    fn new_target_is_complete_with_matching_attachments() {
        let Some(ctx) = test_context() else { return };
        let target = RenderTarget::new(&ctx, 64, 32);

        assert_eq!((target.width(), target.height()), (64, 32));
        assert_eq!(target.status(&ctx), FramebufferStatus::Complete);
        assert_eq!(target.color_texture().width(), 64);
        assert_eq!(target.depth_stencil_texture().height(), 32);
        assert_eq!(target.color_texture().format(), InternalFormat::Rgba8);
        assert_eq!(target.depth_stencil_texture().format(), InternalFormat::Depth24Stencil8);
    }

    #[test]
    fn resize_to_same_size_keeps_storage() {
        let Some(ctx) = test_context() else { return };
        let mut target = RenderTarget::new(&ctx, 16, 16);
        let color_rev = target.color_texture().revision();
        let depth_rev = target.depth_stencil_texture().revision();

        target.resize(&ctx, 16, 16);
        assert_eq!(target.color_texture().revision(), color_rev);
        assert_eq!(target.depth_stencil_texture().revision(), depth_rev);

        target.resize(&ctx, 32, 8);
        assert_eq!((target.width(), target.height()), (32, 8));
        assert_eq!(target.color_texture().revision(), color_rev + 1);
        assert_eq!(target.status(&ctx), FramebufferStatus::Complete);
    }

    #[test]
    fn non_positive_resize_keeps_previous_state() {
        let Some(ctx) = test_context() else { return };
        let mut target = RenderTarget::new(&ctx, 16, 8);
        target.resize(&ctx, 0, 8);
        target.resize(&ctx, 16, -3);
        assert_eq!((target.width(), target.height()), (16, 8));
        assert_eq!(target.status(&ctx), FramebufferStatus::Complete);
    }

    #[test]
    fn unsized_target_draws_nothing() {
        let Some(ctx) = test_context() else { return };
        let target = RenderTarget::new(&ctx, 0, 0);
        assert_eq!(target.width(), -1);
        assert_eq!(target.status(&ctx), FramebufferStatus::Undefined);
        target.clear(&ctx);
    }

    #[test]
    fn targets_share_one_compositor() {
        let Some(ctx) = test_context() else { return };
        let a = RenderTarget::new(&ctx, 8, 8);
        let b = RenderTarget::new(&ctx, 4, 4);
        assert!(Rc::ptr_eq(a.compositor(), b.compositor()));
        assert_eq!(a.compositor().program().handle(), b.compositor().program().handle());
    }

    #[test]
    fn clear_zeroes_color() {
        let Some(ctx) = test_context() else { return };
        let target = RenderTarget::new(&ctx, 4, 4);
        target.clear(&ctx);
        let pixels = target.color_texture().read_pixels(&ctx).unwrap();
        assert!(pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn render_texture_covers_exactly_the_requested_rect() {
        let Some(ctx) = test_context() else { return };
        let target = RenderTarget::new(&ctx, 100, 50);
        target.clear(&ctx);

        let mut tex = Texture::new(InternalFormat::Rgba8);
        let red = [255u8, 0, 0, 255].repeat(4);
        tex.set_pixels(&ctx, 2, 2, PixelFormat::Rgba, PixelType::UnsignedByte, Some(&red));

        target.render_texture(&ctx, &tex, 10, 10, 20, 20, 0.0);

        let pixels = target.color_texture().read_pixels(&ctx).unwrap();
        let at = |x: usize, y: usize| &pixels[(y * 100 + x) * 4..(y * 100 + x) * 4 + 4];

        assert_eq!(at(10, 10), &[255, 0, 0, 255]);
        assert_eq!(at(29, 29), &[255, 0, 0, 255]);
        assert_eq!(at(20, 15), &[255, 0, 0, 255]);
        assert_eq!(at(9, 10), &[0, 0, 0, 0]);
        assert_eq!(at(30, 29), &[0, 0, 0, 0]);
        assert_eq!(at(10, 30), &[0, 0, 0, 0]);
        assert_eq!(at(50, 40), &[0, 0, 0, 0]);
    }

    #[test]
    fn nearer_texture_wins_the_depth_test() {
        let Some(ctx) = test_context() else { return };
        let target = RenderTarget::new(&ctx, 8, 8);
        target.clear(&ctx);

        let mut near = Texture::new(InternalFormat::Rgba8);
        near.set_pixels(&ctx, 1, 1, PixelFormat::Rgba, PixelType::UnsignedByte, Some(&[0, 255, 0, 255]));
        let mut far = Texture::new(InternalFormat::Rgba8);
        far.set_pixels(&ctx, 1, 1, PixelFormat::Rgba, PixelType::UnsignedByte, Some(&[0, 0, 255, 255]));

        target.render_texture(&ctx, &near, 0, 0, 8, 8, -0.5);
        target.render_texture(&ctx, &far, 0, 0, 8, 8, 0.0);

        let pixels = target.color_texture().read_pixels(&ctx).unwrap();
        assert_eq!(&pixels[0..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn moved_from_textures_of_a_target_own_nothing() {
        let Some(ctx) = test_context() else { return };
        let mut tex = Texture::new(InternalFormat::Rgba8);
        tex.set_pixels(&ctx, 2, 2, PixelFormat::Rgba, PixelType::UnsignedByte, None);
        let moved = std::mem::take(&mut tex);
        assert!(tex.handle().is_none());
        assert_eq!(moved.width(), 2);

        let target = RenderTarget::new(&ctx, 4, 4);
        // Empty texture is skipped rather than drawn.
        target.render_texture(&ctx, &tex, 0, 0, 4, 4, 0.0);
    }

    #[test]
    fn oversized_target_exits_with_incomplete_framebuffer_code() {
        const TEST: &str = "render::target::tests::oversized_target_exits_with_incomplete_framebuffer_code";
        let Some(ctx) = test_context() else { return };
        if is_fatal_child(TEST) {
            let too_wide = ctx.max_texture_size() as i32 + 1;
            let _target = RenderTarget::new(&ctx, too_wide, 1);
            return;
        }
        drop(ctx);
        assert_eq!(child_exit_code(TEST), Some(5));
    }
}
