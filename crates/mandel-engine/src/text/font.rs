use std::fmt;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::device::GpuContext;
use crate::gpu::{align4, InternalFormat, PixelFormat, PixelType, Swizzle, Texture};

use super::bitmap::normalize_bitmap;

/// Error returned by [`Font::from_bytes`] and [`Font::from_file`].
#[derive(Debug, Clone)]
pub enum FontLoadError {
    Io { path: PathBuf, reason: String },
    Parse(String),
    InvalidSize(f32),
}

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontLoadError::Io { path, reason } => {
                write!(f, "font load error: {}: {reason}", path.display())
            }
            FontLoadError::Parse(reason) => write!(f, "font load error: {reason}"),
            FontLoadError::InvalidSize(px) => write!(f, "font load error: invalid pixel size {px}"),
        }
    }
}

impl std::error::Error for FontLoadError {}

/// Top-down 8-bit coverage image of a rendered string.
///
/// Rows are `pitch` bytes apart; `pitch` is a multiple of 4.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    pub pitch: usize,
    pub pixels: Vec<u8>,
}

/// Locations tried, in order, when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeMono.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Monaco.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// First font file from a list of common system locations that exists.
pub fn find_system_font() -> Option<PathBuf> {
    SYSTEM_FONTS.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// A single face at a fixed pixel size.
pub struct Font {
    face: fontdue::Font,
    px: f32,
}

impl Font {
    pub fn from_bytes(bytes: &[u8], px: f32) -> Result<Self, FontLoadError> {
        if !(px.is_finite() && px > 0.0) {
            return Err(FontLoadError::InvalidSize(px));
        }
        let face = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError::Parse(e.to_string()))?;
        Ok(Self { face, px })
    }

    pub fn from_file(path: impl AsRef<Path>, px: f32) -> Result<Self, FontLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| FontLoadError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let font = Self::from_bytes(&bytes, px)?;
        log::debug!("loaded font {} at {px}px", path.display());
        Ok(font)
    }

    #[inline]
    pub fn pixel_size(&self) -> f32 {
        self.px
    }

    /// Lays out and rasterizes `text` on one line, shading coverage from
    /// `bg` to `fg`.
    pub fn rasterize(&self, text: &str, fg: u8, bg: u8) -> GlyphBitmap {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.face], &TextStyle::new(text, self.px, 0));

        let glyphs = layout.glyphs();
        if glyphs.is_empty() {
            return GlyphBitmap::default();
        }

        let width = glyphs
            .iter()
            .map(|g| {
                let m = self.face.metrics_indexed(g.key.glyph_index, self.px);
                (g.x + g.width as f32).max(g.x - m.xmin as f32 + m.advance_width)
            })
            .fold(0.0f32, f32::max)
            .ceil()
            .max(0.0) as usize;
        let height = glyphs
            .iter()
            .map(|g| g.y + g.height as f32)
            .fold(layout.height(), f32::max)
            .ceil()
            .max(0.0) as usize;

        let pitch = align4(width);
        let mut pixels = vec![bg; pitch * height];

        for g in glyphs {
            if g.width == 0 || g.height == 0 {
                continue;
            }
            let (metrics, coverage) = self.face.rasterize_config(g.key);
            shade_glyph(
                &mut pixels,
                (width, height, pitch),
                (g.x.round() as i64, g.y.round() as i64),
                (metrics.width, metrics.height),
                &coverage,
                (fg, bg),
            );
        }

        GlyphBitmap { width, height, pitch, pixels }
    }

    /// Renders `text` into a single-channel texture sampled as opaque grey.
    ///
    /// Rows are normalized to 4-byte alignment and flipped so the texture's
    /// first row is the bottom of the text.
    pub fn render_text(&self, ctx: &GpuContext, text: &str) -> Texture {
        let bitmap = self.rasterize(text, 0xFF, 0x00);
        let data = normalize_bitmap(&bitmap.pixels, bitmap.width, bitmap.height, bitmap.pitch);

        let mut texture = Texture::new(InternalFormat::R8);
        texture.set_pixels(
            ctx,
            bitmap.width as u32,
            bitmap.height as u32,
            PixelFormat::Red,
            PixelType::UnsignedByte,
            Some(&data),
        );
        texture.set_swizzle(Swizzle::LUMINANCE);
        texture
    }
}

/// Writes one glyph's coverage into `dst`, clipped to the image.
fn shade_glyph(
    dst: &mut [u8],
    (width, height, pitch): (usize, usize, usize),
    (x0, y0): (i64, i64),
    (gw, gh): (usize, usize),
    coverage: &[u8],
    (fg, bg): (u8, u8),
) {
    for gy in 0..gh {
        let y = y0 + gy as i64;
        if y < 0 || y >= height as i64 {
            continue;
        }
        for gx in 0..gw {
            let x = x0 + gx as i64;
            if x < 0 || x >= width as i64 {
                continue;
            }
            let c = u32::from(coverage[gy * gw + gx]);
            let shaded = (u32::from(bg) * (255 - c) + u32::from(fg) * c + 127) / 255;
            let px = &mut dst[y as usize * pitch + x as usize];
            // Overlapping glyph boxes keep the stronger ink.
            *px = if fg >= bg { (*px).max(shaded as u8) } else { (*px).min(shaded as u8) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;

    #[test]
    fn shading_interpolates_between_background_and_foreground() {
        let mut dst = vec![10u8; 8];
        shade_glyph(&mut dst, (4, 2, 4), (1, 0), (2, 1), &[0, 255], (250, 10));
        assert_eq!(&dst[0..4], &[10, 10, 250, 10]);

        let mut dst = vec![0u8; 4];
        shade_glyph(&mut dst, (4, 1, 4), (0, 0), (1, 1), &[128], (255, 0));
        assert_eq!(dst[0], 128);
    }

    #[test]
    fn shading_clips_to_image() {
        let mut dst = vec![0u8; 4];
        shade_glyph(&mut dst, (2, 2, 2), (-1, 1), (2, 2), &[255; 4], (255, 0));
        assert_eq!(dst, vec![0, 0, 255, 0]);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(Font::from_bytes(b"not a font", 16.0), Err(FontLoadError::Parse(_))));
        assert!(matches!(Font::from_bytes(&[], 0.0), Err(FontLoadError::InvalidSize(_))));
        let err = Font::from_file("/nonexistent/font.ttf", 16.0).err().unwrap();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }

    #[test]
    fn rasterized_text_has_aligned_pitch() {
        let Some(path) = find_system_font() else {
            eprintln!("skipping font test: no system font");
            return;
        };
        let font = Font::from_file(path, 22.0).unwrap();

        let bitmap = font.rasterize("exp: +2.000000", 0xFF, 0x00);
        assert!(bitmap.width > 0 && bitmap.height > 0);
        assert_eq!(bitmap.pitch % 4, 0);
        assert!(bitmap.pitch >= bitmap.width);
        assert_eq!(bitmap.pixels.len(), bitmap.pitch * bitmap.height);
        assert!(bitmap.pixels.iter().any(|&p| p > 0));

        assert_eq!(font.rasterize("", 0xFF, 0x00), GlyphBitmap::default());
    }

    #[test]
    fn rendered_text_texture_is_luminance() {
        let Some(ctx) = test_context() else { return };
        let Some(path) = find_system_font() else {
            eprintln!("skipping font test: no system font");
            return;
        };
        let font = Font::from_file(path, 16.0).unwrap();
        let tex = font.render_text(&ctx, "pos: +0.00000+0.00000i");

        assert_eq!(tex.format(), InternalFormat::R8);
        assert_eq!(tex.swizzle(), Swizzle::LUMINANCE);
        assert!(tex.width() > 0 && tex.height() > 0);
    }
}
