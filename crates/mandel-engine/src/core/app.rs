use winit::event::WindowEvent;

use crate::device::GpuContext;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by [`crate::window::Runtime`].
pub trait App {
    /// Called for every window event, before the runtime handles it.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called after the surface and on-screen target were resized.
    ///
    /// Offscreen targets owned by the app are never resized automatically.
    fn on_resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        let _ = (ctx, width, height);
    }

    /// Called once per frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
