use mandel_engine::input::Key;

const START_ZOOM: f64 = 0.4;

/// Per-frame step sizes, tuned for a 60 Hz frame.
const PAN_STEP: f64 = 0.05;
const ZOOM_STEP: f64 = 0.05;
const EXPONENT_STEP: f64 = 0.005;
const THRESHOLD_STEP: f64 = 0.05;
const SHIFT_BOOST: f64 = 5.0;

/// View and iteration parameters of the fractal, driven by held keys.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FractalParams {
    pub exponent: f64,
    /// Escape radius.
    pub threshold: f64,
    /// Complex plane point at the middle of the view (`re`, `im`).
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            exponent: 2.0,
            threshold: 2.0,
            center: [0.0, 0.0],
            zoom: START_ZOOM,
        }
    }
}

impl FractalParams {
    /// Applies every held binding for `frames` reference frames.
    ///
    /// W/S move ±imag, A/D ±real, Q/E zoom out/in, `[`/`]` exponent,
    /// `-`/`=` threshold, R resets the view. Shift multiplies every step by 5.
    pub fn update(&mut self, held: impl Fn(Key) -> bool, frames: f64) {
        let boost = if held(Key::Shift) { SHIFT_BOOST } else { 1.0 };
        let pan = boost * PAN_STEP / self.zoom * frames;
        let exponent = boost * EXPONENT_STEP * frames;
        let threshold = boost * THRESHOLD_STEP * frames;

        if held(Key::S) {
            self.center[1] -= pan;
        }
        if held(Key::W) {
            self.center[1] += pan;
        }
        if held(Key::A) {
            self.center[0] -= pan;
        }
        if held(Key::D) {
            self.center[0] += pan;
        }
        // Compounded per frame, so zoom never crosses zero.
        if held(Key::Q) {
            self.zoom *= (1.0 - boost * ZOOM_STEP).powf(frames);
        }
        if held(Key::E) {
            self.zoom *= (1.0 + boost * ZOOM_STEP).powf(frames);
        }
        if held(Key::BracketLeft) {
            self.exponent -= exponent;
        }
        if held(Key::BracketRight) {
            self.exponent += exponent;
        }
        if held(Key::Minus) {
            self.threshold -= threshold;
        }
        if held(Key::Equal) {
            self.threshold += threshold;
        }
        if held(Key::R) {
            self.reset_view();
        }
    }

    /// Restores center and zoom; exponent and threshold are kept.
    pub fn reset_view(&mut self) {
        self.center = [0.0, 0.0];
        self.zoom = START_ZOOM;
    }

    pub fn position_line(&self) -> String {
        format!(
            "pos: {:+.5}{:+.5}i zoom: {:.6}x",
            self.center[0], self.center[1], self.zoom
        )
    }

    pub fn shape_line(&self) -> String {
        format!("exp: {:+.6} thresh: {:.6}", self.exponent, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(keys: &[Key]) -> impl Fn(Key) -> bool + '_ {
        move |k| keys.contains(&k)
    }

    #[test]
    fn starts_at_the_classic_set() {
        let p = FractalParams::default();
        assert_eq!(p.position_line(), "pos: +0.00000+0.00000i zoom: 0.400000x");
        assert_eq!(p.shape_line(), "exp: +2.000000 thresh: 2.000000");
    }

    #[test]
    fn pan_step_scales_with_zoom_and_shift() {
        let mut p = FractalParams::default();
        p.update(held(&[Key::D]), 1.0);
        assert!((p.center[0] - 0.05 / 0.4).abs() < 1e-12);

        let mut p = FractalParams::default();
        p.update(held(&[Key::W, Key::Shift]), 1.0);
        assert!((p.center[1] - 5.0 * 0.05 / 0.4).abs() < 1e-12);
        assert_eq!(p.center[0], 0.0);
    }

    #[test]
    fn steps_scale_with_elapsed_frames() {
        let mut one = FractalParams::default();
        one.update(held(&[Key::BracketRight, Key::Equal]), 1.0);
        one.update(held(&[Key::BracketRight, Key::Equal]), 1.0);

        let mut two = FractalParams::default();
        two.update(held(&[Key::BracketRight, Key::Equal]), 2.0);

        assert!((one.exponent - two.exponent).abs() < 1e-12);
        assert!((one.threshold - two.threshold).abs() < 1e-12);
        assert!((two.exponent - 2.01).abs() < 1e-12);
        assert!((two.threshold - 2.1).abs() < 1e-12);
    }

    #[test]
    fn zoom_compounds_and_stays_positive() {
        let mut p = FractalParams::default();
        p.update(held(&[Key::E]), 1.0);
        assert!((p.zoom - 0.4 * 1.05).abs() < 1e-12);

        let mut p = FractalParams::default();
        p.update(held(&[Key::Q, Key::Shift]), 15.0);
        assert!(p.zoom > 0.0);
        assert!((p.zoom - 0.4 * 0.75f64.powi(15)).abs() < 1e-12);
    }

    #[test]
    fn reset_keeps_exponent_and_threshold() {
        let mut p = FractalParams::default();
        p.update(held(&[Key::A, Key::E, Key::Minus, Key::BracketLeft]), 3.0);
        p.update(held(&[Key::R]), 1.0);

        assert_eq!(p.center, [0.0, 0.0]);
        assert_eq!(p.zoom, 0.4);
        assert!(p.exponent < 2.0);
        assert!(p.threshold < 2.0);
    }

    #[test]
    fn overlay_lines_show_signs() {
        let p = FractalParams {
            exponent: -1.5,
            threshold: 4.0,
            center: [-0.75, 0.1],
            zoom: 12.5,
        };
        assert_eq!(p.position_line(), "pos: -0.75000+0.10000i zoom: 12.500000x");
        assert_eq!(p.shape_line(), "exp: -1.500000 thresh: 4.000000");
    }

    #[test]
    fn no_keys_no_change() {
        let mut p = FractalParams::default();
        p.update(|_| false, 4.0);
        assert_eq!(p, FractalParams::default());
    }
}
