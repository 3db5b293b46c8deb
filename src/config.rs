//! Configuration types for Shortbox

use serde::{Deserialize, Serialize};

use crate::geometry::Canvas;

/// x264 preset (speed vs quality tradeoff)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncoderPreset {
    /// Fastest encoding, lowest quality
    Ultrafast,
    /// Fast encoding
    Veryfast,
    /// Faster than medium
    Fast,
    /// Balanced
    #[default]
    Medium,
    /// Higher quality, slower
    Slow,
    /// Best quality, slowest
    Veryslow,
}

impl EncoderPreset {
    /// Get FFmpeg preset string for x264
    pub fn as_x264_preset(&self) -> &'static str {
        match self {
            EncoderPreset::Ultrafast => "ultrafast",
            EncoderPreset::Veryfast => "veryfast",
            EncoderPreset::Fast => "fast",
            EncoderPreset::Medium => "medium",
            EncoderPreset::Slow => "slow",
            EncoderPreset::Veryslow => "veryslow",
        }
    }
}

/// Fixed codec configuration for one conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Output canvas dimensions
    pub canvas: Canvas,
    /// x264 constant rate factor (lower is higher quality)
    pub crf: u8,
    /// x264 speed preset
    pub preset: EncoderPreset,
    /// AAC bitrate in bits per second
    pub audio_bitrate: usize,
    /// AAC output sample rate in Hz
    pub audio_sample_rate: i32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::SHORTS,
            crf: 18,
            preset: EncoderPreset::Medium,
            audio_bitrate: 128_000,
            audio_sample_rate: 44_100,
        }
    }
}

impl ConvertConfig {
    pub fn with_canvas(mut self, canvas: Canvas) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_audio_bitrate(mut self, bitrate: usize) -> Self {
        self.audio_bitrate = bitrate;
        self
    }
}
