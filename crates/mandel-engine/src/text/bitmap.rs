use crate::gpu::align4;

/// Repacks a top-down 8-bit bitmap into bottom-up rows padded to 4 bytes.
///
/// `pixels` holds `height` rows of `src_pitch` bytes, each starting with
/// `width` meaningful bytes. Output row `y` is input row `height - 1 - y`;
/// its stride is `width` rounded up to a multiple of 4 and padding bytes are 0.
pub fn normalize_bitmap(pixels: &[u8], width: usize, height: usize, src_pitch: usize) -> Vec<u8> {
    let pitch = align4(width);
    let mut out = vec![0u8; pitch * height];
    if width == 0 || height == 0 {
        return out;
    }

    for (y, dst) in out.chunks_exact_mut(pitch).enumerate() {
        let src_row = height - 1 - y;
        let start = src_row * src_pitch;
        let Some(src) = pixels.get(start..start + width) else {
            log::warn!("normalize_bitmap: source row {src_row} out of bounds");
            continue;
        };
        dst[..width].copy_from_slice(src);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_then_flipped() {
        // 6 x 2, source pitch 8.
        let src = [
            1, 2, 3, 4, 5, 6, 0xAA, 0xAA, //
            7, 8, 9, 10, 11, 12, 0xBB, 0xBB,
        ];
        let out = normalize_bitmap(&src, 6, 2, 8);
        assert_eq!(
            out,
            vec![
                7, 8, 9, 10, 11, 12, 0, 0, //
                1, 2, 3, 4, 5, 6, 0, 0,
            ]
        );
    }

    #[test]
    fn aligned_width_keeps_stride() {
        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let out = normalize_bitmap(&src, 4, 2, 4);
        assert_eq!(out, vec![5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn narrow_rows_round_up_to_four() {
        let src = [9];
        assert_eq!(normalize_bitmap(&src, 1, 1, 1), vec![9, 0, 0, 0]);
    }

    #[test]
    fn empty_bitmap() {
        assert!(normalize_bitmap(&[], 0, 0, 0).is_empty());
        assert_eq!(normalize_bitmap(&[], 0, 3, 0), Vec::<u8>::new());
    }

    #[test]
    fn short_source_leaves_zero_rows() {
        let src = [1, 2];
        let out = normalize_bitmap(&src, 2, 2, 2);
        // Output row 0 reads source row 1, which is missing.
        assert_eq!(out, vec![0, 0, 0, 0, 1, 2, 0, 0]);
    }
}
