//! Letterbox compositing
//!
//! Places the scaled RGB24 frame onto a black canvas at the transform's
//! offsets, then converts the composite to YUV420P for the encoder.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as SwsContext, Flags as SwsFlags};

use crate::error::{Error, Result};
use crate::geometry::{Canvas, Transform};

const BYTES_PER_PIXEL: usize = 3; // RGB24

/// Composites scaled frames onto a reusable black background.
///
/// The background is allocated and blacked out once; each frame overwrites
/// the same interior footprint, so the letterbox bars are never touched.
pub struct Compositor {
    transform: Transform,
    background: ffmpeg::frame::Video,
    to_yuv: SwsContext,
}

impl Compositor {
    pub fn new(canvas: Canvas, transform: Transform) -> Result<Self> {
        let mut background = ffmpeg::frame::Video::new(Pixel::RGB24, canvas.width, canvas.height);
        background.data_mut(0).fill(0);

        let to_yuv = SwsContext::get(
            Pixel::RGB24,
            canvas.width,
            canvas.height,
            Pixel::YUV420P,
            canvas.width,
            canvas.height,
            SwsFlags::BILINEAR,
        )
        .map_err(|e| Error::Compose(format!("Failed to create converter: {}", e)))?;

        Ok(Self {
            transform,
            background,
            to_yuv,
        })
    }

    /// Composite `scaled` (RGB24 at the fitted size) onto the canvas and
    /// return the YUV420P canvas frame.
    pub fn compose(&mut self, scaled: &ffmpeg::frame::Video) -> Result<ffmpeg::frame::Video> {
        if scaled.format() != Pixel::RGB24 {
            return Err(Error::Compose(format!(
                "expected RGB24 input, got {:?}",
                scaled.format()
            )));
        }
        if scaled.width() != self.transform.new_width
            || scaled.height() != self.transform.new_height
        {
            return Err(Error::Compose(format!(
                "expected {}x{} input, got {}x{}",
                self.transform.new_width,
                self.transform.new_height,
                scaled.width(),
                scaled.height()
            )));
        }

        let src_stride = scaled.stride(0);
        let dst_stride = self.background.stride(0);
        blit_rgb(
            self.background.data_mut(0),
            dst_stride,
            scaled.data(0),
            src_stride,
            self.transform.new_width as usize,
            self.transform.new_height as usize,
            self.transform.x_offset as usize,
            self.transform.y_offset as usize,
        )?;

        let mut yuv = ffmpeg::frame::Video::empty();
        self.to_yuv
            .run(&self.background, &mut yuv)
            .map_err(|e| Error::Compose(e.to_string()))?;
        Ok(yuv)
    }
}

/// Row-copy `src` into `dst` at pixel offset (x, y).
#[allow(clippy::too_many_arguments)]
fn blit_rgb(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    width: usize,
    height: usize,
    x: usize,
    y: usize,
) -> Result<()> {
    let row_bytes = width * BYTES_PER_PIXEL;
    let last_src = height.saturating_sub(1) * src_stride + row_bytes;
    let last_dst = (y + height.saturating_sub(1)) * dst_stride + x * BYTES_PER_PIXEL + row_bytes;
    if src.len() < last_src || dst.len() < last_dst {
        return Err(Error::Compose("frame buffer too small for blit".into()));
    }

    for row in 0..height {
        let s = row * src_stride;
        let d = (y + row) * dst_stride + x * BYTES_PER_PIXEL;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, height: usize, stride: usize, value: u8) -> Vec<u8> {
        let mut buf = vec![0u8; height * stride];
        for row in 0..height {
            for b in &mut buf[row * stride..row * stride + width * BYTES_PER_PIXEL] {
                *b = value;
            }
        }
        buf
    }

    #[test]
    fn blit_places_frame_at_offsets() {
        let (cw, ch) = (10usize, 20usize);
        let (fw, fh) = (4usize, 6usize);
        let (x, y) = (3usize, 7usize);
        let mut dst = vec![0u8; ch * cw * BYTES_PER_PIXEL];
        let src = solid(fw, fh, fw * BYTES_PER_PIXEL, 0xAB);

        blit_rgb(
            &mut dst,
            cw * BYTES_PER_PIXEL,
            &src,
            fw * BYTES_PER_PIXEL,
            fw,
            fh,
            x,
            y,
        )
        .unwrap();

        for row in 0..ch {
            for col in 0..cw {
                let px = &dst[(row * cw + col) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                let inside = row >= y && row < y + fh && col >= x && col < x + fw;
                if inside {
                    assert_eq!(px, [0xAB; 3], "pixel ({}, {}) not copied", col, row);
                } else {
                    assert_eq!(px, [0; 3], "pixel ({}, {}) should stay black", col, row);
                }
            }
        }
    }

    #[test]
    fn blit_honors_source_stride_padding() {
        let (fw, fh) = (2usize, 2usize);
        let src_stride = fw * BYTES_PER_PIXEL + 5; // padded rows
        let src = solid(fw, fh, src_stride, 0x7F);
        let cw = 4usize;
        let mut dst = vec![0u8; 4 * cw * BYTES_PER_PIXEL];

        blit_rgb(&mut dst, cw * BYTES_PER_PIXEL, &src, src_stride, fw, fh, 1, 1).unwrap();

        let px = &dst[(1 * cw + 1) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
        assert_eq!(px, [0x7F; 3]);
        // padding bytes never leak into the canvas
        let px = &dst[(1 * cw + 3) * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
        assert_eq!(px, [0; 3]);
    }

    #[test]
    fn blit_rejects_undersized_buffers() {
        let mut dst = vec![0u8; 8];
        let src = vec![0u8; 8];
        assert!(blit_rgb(&mut dst, 30, &src, 12, 4, 4, 0, 0).is_err());
    }
}
