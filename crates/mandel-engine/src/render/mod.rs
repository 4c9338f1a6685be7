//! Render targets and the shared texture compositor.
//!
//! Convention:
//! - Target pixel coordinates have a top-left origin, +Y down.
//! - Depth `z` lies in `[-1, 1]`; smaller is nearer.

mod compositor;
mod target;

pub use compositor::Compositor;
pub use target::{FramebufferStatus, LoadAction, RenderTarget};
