//! Text rasterization into textures.

mod bitmap;
mod font;

pub use bitmap::normalize_bitmap;
pub use font::{find_system_font, Font, FontLoadError, GlyphBitmap};
