//! Mandel engine crate.
//!
//! GPU resource ownership and compositing for a real-time fractal viewer:
//! move-only wrappers over textures, vertex buffers and shader programs,
//! offscreen render targets, a shared texture compositor, text-to-texture
//! rendering, plus the window/device runtime that drives a frame loop.

pub mod device;
pub mod gpu;
pub mod render;
pub mod text;

pub mod core;
pub mod input;
pub mod logging;
pub mod time;
pub mod window;
