use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::render::RenderTarget;

use super::context::GpuContext;
use super::init::GpuInit;
use super::surface::{choose_alpha_mode, choose_present_mode, choose_surface_format, SurfaceErrorAction};

/// Window-bound GPU state: surface, shared context and the on-screen target.
///
/// The on-screen target draws into the surface texture of the frame in
/// flight and owns a window-sized depth/stencil buffer.
pub struct Gpu<'w> {
    screen: RenderTarget,
    context: GpuContext,

    /// Surface bound to the window.
    ///
    /// Surface lifetime is tied to the window; architecture must ensure the window
    /// outlives the `Gpu` instance.
    surface: wgpu::Surface<'w>,
    adapter: wgpu::Adapter,
    _instance: wgpu::Instance,

    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,
}

/// A single acquired surface texture.
///
/// Holding it prevents acquisition of subsequent frames; hand it back through
/// [`Gpu::present`] promptly.
pub struct GpuFrame {
    surface_texture: wgpu::SurfaceTexture,
}

impl<'w> Gpu<'w> {
    /// Creates the GPU layer for `window`.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("mandel device"),
                required_features: init.required_features,
                required_limits: init.required_limits.using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps.formats, init.prefer_srgb)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: choose_present_mode(&caps.present_modes, init.present_mode),
            alpha_mode: choose_alpha_mode(&caps.alpha_modes, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        log::info!(
            "GPU: {} ({:?}), surface {:?}, {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            config.present_mode
        );

        let context = GpuContext::new(device, queue);
        let screen = RenderTarget::screen(&context, size.width, size.height);

        Ok(Gpu {
            screen,
            context,
            surface,
            adapter,
            _instance: instance,
            config,
            size,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Context and on-screen target, borrowed together for drawing.
    pub fn parts(&mut self) -> (&GpuContext, &mut RenderTarget) {
        (&self.context, &mut self.screen)
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Reconfigures the surface and the screen depth buffer after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(self.context.device(), &self.config);
        self.screen
            .resize_screen(&self.context, new_size.width, new_size.height);
    }

    /// Switches the present mode, falling back to `Fifo` when unsupported.
    pub fn set_present_mode(&mut self, mode: wgpu::PresentMode) {
        let caps = self.surface.get_capabilities(&self.adapter);
        let chosen = choose_present_mode(&caps.present_modes, mode);
        if chosen != mode {
            log::warn!("present mode {mode:?} unsupported, using {chosen:?}");
        }
        if chosen == self.config.present_mode {
            return;
        }
        self.config.present_mode = chosen;
        if self.size.width > 0 && self.size.height > 0 {
            self.surface.configure(self.context.device(), &self.config);
        }
        log::info!("present mode: {chosen:?}");
    }

    /// Acquires the next surface texture, attaches it to the on-screen target
    /// and clears it.
    pub fn begin_frame(&mut self) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.screen.attach_surface(view, self.config.format);
        self.screen.clear(&self.context);

        Ok(GpuFrame { surface_texture })
    }

    /// Detaches the surface texture from the on-screen target and presents it.
    pub fn present(&mut self, frame: GpuFrame) {
        self.screen.detach_surface();
        frame.surface_texture.present();
    }

    /// Converts a `SurfaceError` into a higher-level action, reconfiguring
    /// the surface when it was lost or outdated.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        let action = SurfaceErrorAction::for_error(&err);
        if action == SurfaceErrorAction::Reconfigured && self.size.width > 0 && self.size.height > 0 {
            self.surface.configure(self.context.device(), &self.config);
        }
        action
    }
}
