//! Frame scaling
//!
//! Lanczos resize of decoded frames to the fitted letterbox dimensions,
//! converting to RGB24 in the same pass.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as SwsContext, Flags as SwsFlags};

use crate::error::{Error, Result};
use crate::types::Resolution;

/// Frame scaler with fixed input and output geometry
pub struct Scaler {
    ctx: SwsContext,
    output: Resolution,
}

impl Scaler {
    /// Create a Lanczos scaler from `src_format` at `src` to RGB24 at `dst`.
    pub fn new(src_format: Pixel, src: Resolution, dst: Resolution) -> Result<Self> {
        let ctx = SwsContext::get(
            src_format,
            src.width,
            src.height,
            Pixel::RGB24,
            dst.width,
            dst.height,
            SwsFlags::LANCZOS,
        )
        .map_err(|e| Error::Scaling(format!("Failed to create scaler: {}", e)))?;

        Ok(Self { ctx, output: dst })
    }

    /// Scale `input` into a new RGB24 frame of the configured output size.
    pub fn run(&mut self, input: &ffmpeg::frame::Video) -> Result<ffmpeg::frame::Video> {
        let mut output = ffmpeg::frame::Video::empty();
        self.ctx
            .run(input, &mut output)
            .map_err(|e| Error::Scaling(e.to_string()))?;
        Ok(output)
    }

    pub fn output(&self) -> Resolution {
        self.output
    }
}
