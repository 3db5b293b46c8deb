//! Letterbox geometry
//!
//! Computes how a source frame fits onto the fixed 9:16 output canvas:
//! a single scale factor, the fitted dimensions, and the centering offsets.
//! Everything here is pure arithmetic; the per-frame work lives in
//! [`crate::processing`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Resolution;

/// Fixed-size output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 9:16 portrait canvas for shorts output
    pub const SHORTS: Self = Self::new(1080, 1920);

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::SHORTS
    }
}

impl std::fmt::Display for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-job letterbox transform, computed once from the source's nominal
/// dimensions and applied identically to every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// `min(canvas_w / source_w, canvas_h / source_h)`
    pub scale: f64,
    /// Fitted frame width, never exceeds the canvas width
    pub new_width: u32,
    /// Fitted frame height, never exceeds the canvas height
    pub new_height: u32,
    /// Left edge of the fitted frame on the canvas
    pub x_offset: u32,
    /// Top edge of the fitted frame on the canvas
    pub y_offset: u32,
}

impl Transform {
    /// Fit `source` inside `canvas`, preserving aspect ratio.
    ///
    /// The scaled frame touches the canvas on its constrained axis and is
    /// centered on the other. Centering uses integer division, so an odd
    /// remainder leaves the frame one pixel closer to the top/left edge.
    pub fn fit(source: Resolution, canvas: Canvas) -> Result<Self> {
        if source.width == 0 || source.height == 0 {
            return Err(Error::InvalidDimensions(format!(
                "source reports {}x{}",
                source.width, source.height
            )));
        }

        let scale = f64::min(
            canvas.width as f64 / source.width as f64,
            canvas.height as f64 / source.height as f64,
        );

        let new_width = (source.width as f64 * scale).round() as u32;
        let new_height = (source.height as f64 * scale).round() as u32;

        let x_offset = (canvas.width - new_width) / 2;
        let y_offset = (canvas.height - new_height) / 2;

        Ok(Self {
            scale,
            new_width,
            new_height,
            x_offset,
            y_offset,
        })
    }

    /// Fitted frame size as a [`Resolution`]
    pub fn fitted(&self) -> Resolution {
        Resolution::new(self.new_width, self.new_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorts_canvas_is_9_16() {
        assert_eq!(Canvas::SHORTS.width, 1080);
        assert_eq!(Canvas::SHORTS.height, 1920);
        let ratio = Canvas::SHORTS.width as f64 / Canvas::SHORTS.height as f64;
        assert!((ratio - 0.5625).abs() < 0.001);
    }

    #[test]
    fn landscape_source_fills_width() {
        let t = Transform::fit(Resolution::new(1920, 1080), Canvas::SHORTS).unwrap();
        assert_eq!(t.new_width, 1080);
        assert_eq!(t.new_height, 608); // 1080 * 0.5625 = 607.5, rounds up
        assert_eq!(t.x_offset, 0);
        assert_eq!(t.y_offset, 656);
    }

    #[test]
    fn small_landscape_source_upscales_to_width() {
        let t = Transform::fit(Resolution::new(640, 360), Canvas::SHORTS).unwrap();
        assert!((t.scale - 1.6875).abs() < 1e-9);
        assert_eq!(t.new_width, 1080);
        assert_eq!(t.new_height, 608);
        assert_eq!(t.x_offset, 0);
        assert_eq!(t.y_offset, 656);
    }

    #[test]
    fn portrait_source_at_canvas_ratio_fills_canvas() {
        let t = Transform::fit(Resolution::new(1080, 1920), Canvas::SHORTS).unwrap();
        assert_eq!(t.new_width, 1080);
        assert_eq!(t.new_height, 1920);
        assert_eq!(t.x_offset, 0);
        assert_eq!(t.y_offset, 0);
        assert!((t.scale - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tall_source_fills_height() {
        let t = Transform::fit(Resolution::new(500, 2000), Canvas::SHORTS).unwrap();
        assert_eq!(t.new_height, 1920);
        assert_eq!(t.new_width, 480);
        assert_eq!(t.x_offset, 300);
        assert_eq!(t.y_offset, 0);
    }

    #[test]
    fn square_source_is_centered_vertically() {
        let t = Transform::fit(Resolution::new(500, 500), Canvas::SHORTS).unwrap();
        assert_eq!(t.new_width, 1080);
        assert_eq!(t.new_height, 1080);
        assert_eq!(t.x_offset, 0);
        assert_eq!(t.y_offset, 420);
    }

    #[test]
    fn odd_remainder_centering_is_off_by_at_most_one() {
        // 1080 - 607 leaves an odd remainder on the vertical axis
        let t = Transform::fit(Resolution::new(1921, 1080), Canvas::SHORTS).unwrap();
        let right = Canvas::SHORTS.width - t.new_width - t.x_offset;
        let bottom = Canvas::SHORTS.height - t.new_height - t.y_offset;
        assert!(right.abs_diff(t.x_offset) <= 1);
        assert!(bottom.abs_diff(t.y_offset) <= 1);
    }

    #[test]
    fn fitted_frame_never_exceeds_canvas() {
        let canvas = Canvas::SHORTS;
        for w in (1..4000).step_by(37) {
            for h in (1..4000).step_by(41) {
                let t = Transform::fit(Resolution::new(w, h), canvas).unwrap();
                assert!(t.new_width <= canvas.width, "{}x{} overflows width", w, h);
                assert!(t.new_height <= canvas.height, "{}x{} overflows height", w, h);
                // The frame touches the canvas on its constrained axis
                assert!(
                    t.new_width == canvas.width || t.new_height == canvas.height,
                    "{}x{} touches neither axis",
                    w,
                    h
                );
                // Centering within integer-division tolerance
                let right = canvas.width - t.new_width - t.x_offset;
                let bottom = canvas.height - t.new_height - t.y_offset;
                assert!(right.abs_diff(t.x_offset) <= 1);
                assert!(bottom.abs_diff(t.y_offset) <= 1);
            }
        }
    }

    #[test]
    fn fit_is_pure() {
        let a = Transform::fit(Resolution::new(1280, 720), Canvas::SHORTS).unwrap();
        let b = Transform::fit(Resolution::new(1280, 720), Canvas::SHORTS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(Transform::fit(Resolution::new(0, 1080), Canvas::SHORTS).is_err());
        assert!(Transform::fit(Resolution::new(1920, 0), Canvas::SHORTS).is_err());
    }
}
