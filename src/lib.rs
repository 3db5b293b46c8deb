//! Shortbox — 9:16 shorts video converter
//!
//! Converts an arbitrary-aspect-ratio video into a 1080x1920 "shorts" MP4:
//! every frame is Lanczos-resized to fit, centered on a black canvas, and
//! the composite is re-encoded (H.264 video, AAC audio) through FFmpeg.
//!
//! # Example
//!
//! ```rust,no_run
//! use shortbox::{ConversionJob, JobEvent};
//!
//! fn main() {
//!     let job = ConversionJob::new("talk.mp4", "talk_shorts.mp4");
//!     match job.spawn().wait() {
//!         JobEvent::Completed { output } => println!("wrote {}", output.display()),
//!         JobEvent::Failed { message } => eprintln!("Error: {}", message),
//!     }
//! }
//! ```

pub mod config;
pub mod controller;
pub mod decode;
pub mod encode;
pub mod error;
pub mod geometry;
pub mod job;
pub mod muxer;
pub mod processing;
pub mod types;

// Re-exports for convenience
pub use config::{ConvertConfig, EncoderPreset};
pub use controller::{Controller, Phase, StatusLine};
pub use decode::VideoStream;
pub use encode::{AacEncoder, VideoEncoder};
pub use error::{Error, Result};
pub use geometry::{Canvas, Transform};
pub use job::{ConversionJob, JobEvent, JobHandle};
pub use muxer::Muxer;
pub use types::{Framerate, Resolution};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
