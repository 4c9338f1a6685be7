//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - the shared [`GpuContext`] every GPU wrapper is created from
//! - configuring the Surface and presenting frames through the on-screen target
//! - unrecoverable errors that end the process

mod context;
pub mod fatal;
mod gpu;
mod init;
mod surface;

pub use context::GpuContext;
#[cfg(test)]
pub(crate) use context::test_context;
pub use gpu::{Gpu, GpuFrame};
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
