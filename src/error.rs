//! Error types for Shortbox

use thiserror::Error;

/// Result type alias for Shortbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shortbox error type
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("{0}")]
    Open(String),

    #[error("No video stream in input")]
    NoVideoStream,

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Decode error: {0}")]
    Decode(String),

    // Processing errors
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Scaling error: {0}")]
    Scaling(String),

    #[error("Compositing error: {0}")]
    Compose(String),

    // Encoder errors
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    // Output errors
    #[error("Muxer error: {0}")]
    Muxer(String),

    // General errors
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
