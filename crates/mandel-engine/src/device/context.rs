use std::cell::OnceCell;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::gpu::MipmapGenerator;
use crate::render::Compositor;

/// Device + queue shared by every GPU wrapper, plus lazily built shared state.
///
/// One context exists per device. It is not `Send`: all wrappers created from
/// it are used and dropped on the thread that owns it.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Blit program + unit quad shared by every render target.
    compositor: OnceCell<Rc<Compositor>>,

    /// Downsampling pipelines used by `Texture::generate_mipmap`.
    mipmaps: OnceCell<MipmapGenerator>,
}

impl GpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            compositor: OnceCell::new(),
            mipmaps: OnceCell::new(),
        }
    }

    /// Creates a context without a surface (offscreen rendering, tests, tools).
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("mandel headless device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::debug!("headless context on {:?}", adapter.get_info().name);
        Ok(Self::new(device, queue))
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Largest width/height accepted for a 2D texture or render target.
    pub fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Returns the shared compositor, building it on first use.
    ///
    /// Every call returns the same instance for the lifetime of the context.
    pub fn compositor(&self) -> Rc<Compositor> {
        Rc::clone(self.compositor.get_or_init(|| Rc::new(Compositor::new(self))))
    }

    pub(crate) fn mipmaps(&self) -> &MipmapGenerator {
        self.mipmaps.get_or_init(|| MipmapGenerator::new(&self.device))
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Submits one recorded command buffer.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Headless context for GPU-backed tests; `None` (test skipped) without an adapter.
#[cfg(test)]
pub(crate) fn test_context() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e:#}");
            None
        }
    }
}
