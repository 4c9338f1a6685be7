//! Interactive Mandelbrot viewer.
//!
//! W/A/S/D pan, Q/E zoom, `[`/`]` exponent, `-`/`=` escape threshold,
//! R resets the view, Shift speeds everything up. F11 toggles full screen,
//! V toggles vsync, F12 saves the fractal as PNG, Escape quits.

mod config;
mod params;
mod viewer;

use anyhow::{Context, Result};
use winit::dpi::LogicalSize;

use mandel_engine::device::GpuInit;
use mandel_engine::logging::{init_logging, LoggingConfig};
use mandel_engine::text::{find_system_font, Font};
use mandel_engine::window::{Runtime, RuntimeConfig};

use config::ViewerConfig;
use viewer::{present_mode, Viewer};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = ViewerConfig::from_env().context("invalid viewer configuration")?;
    log::debug!("{config:?}");

    let font = load_font(&config);

    let runtime = RuntimeConfig {
        title: config.title.clone(),
        initial_size: LogicalSize::new(f64::from(config.width), f64::from(config.height)),
    };
    let gpu_init = GpuInit {
        present_mode: present_mode(config.vsync),
        ..GpuInit::default()
    };

    Runtime::run(runtime, gpu_init, Viewer::new(config, font))
}

/// Overlay font, or `None` (no overlays) when nothing usable is found.
fn load_font(config: &ViewerConfig) -> Option<Font> {
    let Some(path) = config.font_path.clone().or_else(find_system_font) else {
        log::warn!("no font found, overlays disabled (set MANDEL_FONT)");
        return None;
    };
    match Font::from_file(&path, config.font_size) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("{e}, overlays disabled");
            None
        }
    }
}
