//! Frame processing
//!
//! Per-frame letterbox pipeline: Lanczos resize to the fitted dimensions,
//! composite onto the black canvas, convert to YUV420P for encoding.

mod compose;
mod scale;

pub use compose::Compositor;
pub use scale::Scaler;

use ffmpeg_next as ffmpeg;

use crate::error::{Error, Result};
use crate::geometry::{Canvas, Transform};
use crate::types::Resolution;

/// Per-job frame pipeline.
///
/// The scale/offset geometry is fixed at construction; every frame of the
/// stream goes through the identical resize + composite. A frame arriving
/// with dimensions other than the source's nominal ones is rejected.
pub struct FramePipeline {
    source: Resolution,
    transform: Transform,
    scaler: Option<Scaler>,
    compositor: Compositor,
}

impl FramePipeline {
    pub fn new(canvas: Canvas, transform: Transform, source: Resolution) -> Result<Self> {
        Ok(Self {
            source,
            transform,
            scaler: None,
            compositor: Compositor::new(canvas, transform)?,
        })
    }

    /// Process one decoded frame into an encoder-ready YUV420P canvas frame.
    pub fn process(&mut self, frame: &ffmpeg::frame::Video) -> Result<ffmpeg::frame::Video> {
        if frame.width() != self.source.width || frame.height() != self.source.height {
            return Err(Error::UnsupportedInput(format!(
                "frame resolution changed mid-stream: {} -> {}x{}",
                self.source,
                frame.width(),
                frame.height()
            )));
        }

        // The scaler is created on the first frame, once the decoder's
        // actual pixel format is known.
        if self.scaler.is_none() {
            self.scaler = Some(Scaler::new(
                frame.format(),
                self.source,
                self.transform.fitted(),
            )?);
        }
        let scaler = self.scaler.as_mut().expect("scaler initialized above");

        let scaled = scaler.run(frame)?;
        self.compositor.compose(&scaled)
    }
}
