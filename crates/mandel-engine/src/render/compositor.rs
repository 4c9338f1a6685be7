use crate::device::GpuContext;
use crate::device::fatal::terminate;
use crate::gpu::{
    AttribType, BufferUsage, DrawState, Program, RowOrigin, Texture, UniformLocation, VertexArray,
};

use super::target::RenderTarget;

const BLIT_VS: &str = include_str!("shaders/blit.vert.wgsl");
const BLIT_FS: &str = include_str!("shaders/blit.frag.wgsl");

/// Two triangles over the unit square, as texture coordinates.
const QUAD_TEXCOORDS: [[f32; 2]; 6] = [
    [0.0, 1.0],
    [0.0, 0.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];

/// Blit program + unit quad shared by every [`RenderTarget`].
///
/// Built once per [`GpuContext`] via [`GpuContext::compositor`].
pub struct Compositor {
    program: Program,
    quad: VertexArray,

    tex_position: UniformLocation,
    tex_size: UniformLocation,
    tex_z: UniformLocation,
    screen_size: UniformLocation,
    tex_flip: UniformLocation,
    tex_swizzle: UniformLocation,
}

impl Compositor {
    pub(crate) fn new(ctx: &GpuContext) -> Self {
        let program = match Program::from_sources(ctx, BLIT_VS, BLIT_FS) {
            Ok(p) => p,
            Err(e) => terminate(e.into()),
        };

        let mut quad = VertexArray::new();
        let index = quad.add_vertex_buffer(std::mem::size_of::<[f32; 2]>() as u32, 0);
        if let Some(vb) = quad.buffer_mut(index) {
            vb.add_attrib(2, AttribType::Float);
            vb.bind_data(ctx, &QUAD_TEXCOORDS, QUAD_TEXCOORDS.len() as u32, BufferUsage::Static);
        }

        program.set_uniform(program.get_uniform("tex"), 0i32);

        log::debug!("compositor ready (program {})", program.handle());

        Self {
            tex_position: program.get_uniform("tex_position"),
            tex_size: program.get_uniform("tex_size"),
            tex_z: program.get_uniform("tex_z"),
            screen_size: program.get_uniform("screen_size"),
            tex_flip: program.get_uniform("tex_flip"),
            tex_swizzle: program.get_uniform("tex_swizzle"),
            program,
            quad,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Draws `texture` over the pixel rect `[x, x + w) × [y, y + h)` of
    /// `target` at depth `z` in `[-1, 1]`.
    pub(crate) fn render(
        &self,
        ctx: &GpuContext,
        target: &RenderTarget,
        texture: &Texture,
        rect: [i32; 4],
        z: f32,
    ) {
        let [x, y, w, h] = rect;
        if texture.width() == 0 || texture.height() == 0 {
            log::debug!("render_texture: texture {} is empty, skipped", texture.handle());
            return;
        }

        let p = &self.program;
        p.set_uniform(self.tex_position, [x, y]);
        p.set_uniform(self.tex_size, [w, h]);
        p.set_uniform(self.tex_z, z);
        p.set_uniform(self.screen_size, [target.width(), target.height()]);
        p.set_uniform(self.tex_flip, u32::from(texture.row_origin() == RowOrigin::BottomUp));
        p.set_uniform(self.tex_swizzle, texture.swizzle().indices());

        target.draw(ctx, p, &self.quad, &[texture], DrawState::COMPOSITE, 0..6);
    }
}
