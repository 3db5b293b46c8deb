//! Software H.264 encoder via FFmpeg
//!
//! libx264 with CRF rate control. Output PTS is a monotonically increasing
//! frame counter in the 1/fps timebase, so the output timeline always
//! starts at zero regardless of source timestamps.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;

use crate::config::ConvertConfig;
use crate::error::{Error, Result};
use crate::types::{Framerate, Resolution};

/// FFmpeg encoder name used for the video stream
pub const ENCODER_NAME: &str = "libx264";

/// H.264 video encoder with fixed output geometry
pub struct VideoEncoder {
    encoder: ffmpeg::encoder::Video,
    time_base: ffmpeg::Rational,
    frame_rate: Framerate,
    frame_index: i64,
}

impl VideoEncoder {
    /// Check whether libx264 is available in the linked FFmpeg build
    pub fn is_available() -> bool {
        ffmpeg::init().is_ok() && ffmpeg::encoder::find_by_name(ENCODER_NAME).is_some()
    }

    /// Create and open an encoder for `resolution` at `frame_rate`.
    ///
    /// `global_header` must match the output container's requirements and
    /// is taken from the muxer.
    pub fn new(
        config: &ConvertConfig,
        resolution: Resolution,
        frame_rate: Framerate,
        global_header: bool,
    ) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

        let codec = ffmpeg::encoder::find_by_name(ENCODER_NAME).ok_or_else(|| {
            Error::EncoderInit(format!(
                "{} not found. Install FFmpeg with H.264 support.",
                ENCODER_NAME
            ))
        })?;

        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let mut encoder = context
            .encoder()
            .video()
            .map_err(|e| Error::EncoderInit(e.to_string()))?;

        let time_base = ffmpeg::Rational::new(frame_rate.den as i32, frame_rate.num as i32);

        encoder.set_width(resolution.width);
        encoder.set_height(resolution.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(
            frame_rate.num as i32,
            frame_rate.den as i32,
        )));
        if global_header {
            encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("crf", &config.crf.to_string());
        opts.set("preset", config.preset.as_x264_preset());

        let mut opened = encoder
            .open_with(opts)
            .map_err(|e| Error::EncoderInit(format!("Failed to open {}: {}", ENCODER_NAME, e)))?;

        // libx264 resets the aspect ratio during open; force square pixels
        // on the opened context so players do not letterbox a second time.
        opened.set_aspect_ratio(ffmpeg::Rational::new(1, 1));

        Ok(Self {
            encoder: opened,
            time_base,
            frame_rate,
            frame_index: 0,
        })
    }

    /// Encoder timebase (1/fps) for packet rescaling
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Seconds of video submitted so far, by frame count
    pub fn clock_seconds(&self) -> f64 {
        self.frame_index as f64 / self.frame_rate.as_f64()
    }

    /// Frames submitted so far
    pub fn frames_sent(&self) -> i64 {
        self.frame_index
    }

    pub(crate) fn inner(&self) -> &ffmpeg::encoder::Video {
        &self.encoder
    }

    /// Encode one canvas frame; PTS is stamped from the running counter.
    pub fn encode(&mut self, frame: &mut ffmpeg::frame::Video) -> Result<Vec<ffmpeg::Packet>> {
        frame.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encoder
            .send_frame(frame)
            .map_err(|e| Error::EncodingFailed(format!("Failed to send frame: {}", e)))?;
        self.receive()
    }

    /// Flush remaining frames out of the encoder.
    pub fn finish(&mut self) -> Result<Vec<ffmpeg::Packet>> {
        self.encoder
            .send_eof()
            .map_err(|e| Error::EncodingFailed(format!("Failed to send EOF: {}", e)))?;
        self.receive()
    }

    fn receive(&mut self) -> Result<Vec<ffmpeg::Packet>> {
        let mut packets = Vec::new();
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => packets.push(packet),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => break,
                Err(ffmpeg::Error::Eof) => break,
                Err(e) => {
                    return Err(Error::EncodingFailed(format!(
                        "Failed to receive packet: {}",
                        e
                    )))
                }
            }
        }
        Ok(packets)
    }
}
