//! Encoding module
//!
//! Software encoding through FFmpeg: H.264 (libx264) for the composited
//! video stream and AAC for the staged audio track.

pub mod audio;
pub mod video;

pub use audio::{AacEncoder, StagedAudio};
pub use video::VideoEncoder;
