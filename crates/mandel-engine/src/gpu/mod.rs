//! Owners of device objects: textures, vertex buffers/arrays and programs.
//!
//! Every wrapper is move-only and releases its object when dropped. A
//! default-constructed (or `std::mem::take`n) wrapper holds `Handle::NONE`
//! and owns nothing.

mod buffer;
mod handle;
mod mipmap;
mod program;
pub mod reflect;
mod texture;
mod vertex_array;

pub use buffer::{AttribType, BufferUsage, UploadStrategy, VertexAttrib, VertexBuffer};
pub use handle::Handle;
pub(crate) use mipmap::MipmapGenerator;
pub use program::{DrawState, Program, ProgramError, UniformLocation, UniformValue};
pub use texture::{
    InternalFormat, PixelFormat, PixelType, RowOrigin, Swizzle, SwizzleSource, Texture, UploadError,
};
pub(crate) use texture::align4;
pub use vertex_array::VertexArray;
