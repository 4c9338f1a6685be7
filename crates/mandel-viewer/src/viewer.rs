use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use winit::event::WindowEvent;

use mandel_engine::core::{App, AppControl, FrameCtx};
use mandel_engine::device::GpuContext;
use mandel_engine::gpu::{AttribType, BufferUsage, DrawState, Program, UniformLocation, VertexArray};
use mandel_engine::input::Key;
use mandel_engine::render::RenderTarget;
use mandel_engine::text::Font;

use crate::config::ViewerConfig;
use crate::params::FractalParams;

/// Full-screen quad in NDC, two triangles.
const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, 1.0],
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

/// Vertical distance between overlay lines, in pixels.
const OVERLAY_LINE_STEP: i32 = 22;
const OVERLAY_Z: f32 = -0.5;

/// GPU state of the fractal pass. Built on the first frame.
struct FractalPass {
    program: Program,
    quad: VertexArray,
    target: RenderTarget,

    aspect: UniformLocation,
    expon: UniformLocation,
    thresh: UniformLocation,
    center: UniformLocation,
    zoom: UniformLocation,
}

impl FractalPass {
    fn new(ctx: &GpuContext, config: &ViewerConfig, width: u32, height: u32) -> Self {
        let program = Program::new(ctx, config.vertex_shader(), config.fragment_shader());

        let mut quad = VertexArray::new();
        let index = quad.add_vertex_buffer(std::mem::size_of::<[f32; 2]>() as u32, 0);
        if let Some(vb) = quad.buffer_mut(index) {
            vb.add_attrib(2, AttribType::Float);
            vb.bind_data(ctx, &QUAD_VERTICES, QUAD_VERTICES.len() as u32, BufferUsage::Static);
        }

        program.set_uniform(program.get_uniform("max_steps"), config.max_steps);

        let pass = Self {
            aspect: program.get_uniform("aspect"),
            expon: program.get_uniform("expon"),
            thresh: program.get_uniform("thresh"),
            center: program.get_uniform("center"),
            zoom: program.get_uniform("zoom"),
            target: RenderTarget::new(ctx, width as i32, height as i32),
            program,
            quad,
        };
        pass.set_aspect(width, height);
        pass
    }

    fn set_aspect(&self, width: u32, height: u32) {
        self.program
            .set_uniform(self.aspect, width as f32 / height.max(1) as f32);
    }

    fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.target.resize(ctx, width as i32, height as i32);
        self.set_aspect(width, height);
    }

    fn draw(&self, ctx: &GpuContext, params: &FractalParams) {
        let p = &self.program;
        p.set_uniform(self.expon, params.exponent as f32);
        p.set_uniform(self.thresh, params.threshold as f32);
        p.set_uniform(self.center, [params.center[0] as f32, params.center[1] as f32]);
        p.set_uniform(self.zoom, params.zoom as f32);

        self.target.clear(ctx);
        self.target
            .draw(ctx, p, &self.quad, &[], DrawState::OPAQUE, 0..QUAD_VERTICES.len() as u32);
    }

    /// Writes the fractal target's color attachment to `path` as PNG.
    fn save_png(&self, ctx: &GpuContext, path: &Path) -> Result<()> {
        let texture = self.target.color_texture();
        let pixels = texture
            .read_pixels(ctx)
            .context("fractal target has no readable storage")?;
        let image = image::RgbaImage::from_raw(texture.width(), texture.height(), pixels)
            .context("readback size does not match the target")?;
        image
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// The interactive fractal viewer.
pub struct Viewer {
    config: ViewerConfig,
    params: FractalParams,
    font: Option<Font>,
    pass: Option<FractalPass>,
    vsync: bool,
}

impl Viewer {
    pub fn new(config: ViewerConfig, font: Option<Font>) -> Self {
        Self {
            vsync: config.vsync,
            params: FractalParams::default(),
            font,
            pass: None,
            config,
        }
    }

    fn title(&self) -> String {
        if self.vsync {
            self.config.title.clone()
        } else {
            format!("{} (vsync off)", self.config.title)
        }
    }
}

pub fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::Immediate
    }
}

impl App for Viewer {
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        if let WindowEvent::CloseRequested = event {
            log::info!("window closed");
            return AppControl::Exit;
        }
        AppControl::Continue
    }

    fn on_resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        if let Some(pass) = self.pass.as_mut() {
            pass.resize(ctx, width, height);
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let input_frame = ctx.input_frame;
        let pressed = |k| input_frame.pressed(k);

        if pressed(Key::Escape) {
            log::info!("escape pressed, exiting");
            return AppControl::Exit;
        }
        if pressed(Key::F11) {
            let fullscreen = ctx.window.toggle_fullscreen();
            log::info!("fullscreen: {fullscreen}");
        }
        if pressed(Key::V) {
            self.vsync = !self.vsync;
            ctx.gpu.set_present_mode(present_mode(self.vsync));
            ctx.window.set_title(&self.title());
        }
        let screenshot = pressed(Key::F12);

        self.params
            .update(|k| ctx.input.key_down(k), f64::from(ctx.time.reference_frames()));

        let (width, height) = ctx.window.size();
        if width == 0 || height == 0 {
            return AppControl::Continue;
        }
        if self.pass.is_none() {
            self.pass = Some(FractalPass::new(ctx.context(), &self.config, width, height));
        }
        let Some(pass) = self.pass.as_ref() else {
            return AppControl::Continue;
        };

        let params = &self.params;
        let font = self.font.as_ref();
        let control = ctx.render(|gctx, screen| {
            pass.draw(gctx, params);

            let (sw, sh) = (screen.width(), screen.height());
            screen.render_texture(gctx, pass.target.color_texture(), 0, 0, sw, sh, 0.0);

            let Some(font) = font else { return };
            for (i, line) in [params.position_line(), params.shape_line()].iter().enumerate() {
                let mut text = font.render_text(gctx, line);
                text.generate_mipmap(gctx);
                let (tw, th) = (text.width() as i32, text.height() as i32);
                screen.render_texture(gctx, &text, sw - tw, i as i32 * OVERLAY_LINE_STEP, tw, th, OVERLAY_Z);
            }
        });

        if screenshot {
            let path = PathBuf::from(format!("mandel-{}.png", ctx.time.frame_index));
            match pass.save_png(ctx.context(), &path) {
                Ok(()) => log::info!("saved {}", path.display()),
                Err(e) => log::error!("screenshot failed: {e:#}"),
            }
        }

        control
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_maps_to_present_modes() {
        assert_eq!(present_mode(true), wgpu::PresentMode::Fifo);
        assert_eq!(present_mode(false), wgpu::PresentMode::Immediate);
    }

    #[test]
    fn title_marks_disabled_vsync() {
        let mut viewer = Viewer::new(ViewerConfig::default(), None);
        assert_eq!(viewer.title(), "Mandelbrot");
        viewer.vsync = false;
        assert_eq!(viewer.title(), "Mandelbrot (vsync off)");
    }
}
