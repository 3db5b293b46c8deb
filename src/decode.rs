//! Source video decoding
//!
//! [`VideoStream`] owns the demuxer and video decoder for one conversion job.
//! Frames are produced lazily, one at a time; the whole family of FFmpeg
//! contexts is released when the stream drops at job end.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::media::Type as MediaType;

use crate::error::{Error, Result};
use crate::types::{Framerate, Resolution};

/// An opened source video
pub struct VideoStream {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    resolution: Resolution,
    frame_rate: Framerate,
    duration: f64,
    has_audio: bool,
    eof_sent: bool,
}

impl VideoStream {
    /// Open `path` and prepare a decoder for its best video stream.
    ///
    /// Sources carrying rotation metadata are rejected rather than decoded
    /// with wrong geometry.
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

        let ictx = ffmpeg::format::input(&path).map_err(|e| Error::Open(e.to_string()))?;

        let (stream_index, parameters, frame_rate) = {
            let stream = ictx
                .streams()
                .best(MediaType::Video)
                .ok_or(Error::NoVideoStream)?;

            if let Some(angle) = rotation_degrees(&stream) {
                return Err(Error::UnsupportedInput(format!(
                    "source carries rotation metadata ({:.0} degrees)",
                    angle
                )));
            }

            let rate = stream.avg_frame_rate();
            let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
                Framerate::new(rate.numerator() as u32, rate.denominator() as u32)
            } else {
                Framerate::FPS_30
            };

            (stream.index(), stream.parameters(), frame_rate)
        };

        let codec_ctx = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| Error::Open(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| Error::Open(e.to_string()))?;

        let resolution = Resolution::new(decoder.width(), decoder.height());
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Error::InvalidDimensions(format!(
                "source reports {}",
                resolution
            )));
        }

        let duration = if ictx.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
            ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let has_audio = ictx.streams().best(MediaType::Audio).is_some();

        Ok(Self {
            ictx,
            decoder,
            stream_index,
            resolution,
            frame_rate,
            duration,
            has_audio,
            eof_sent: false,
        })
    }

    /// Nominal source dimensions
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reported average frame rate (falls back to 30 fps)
    pub fn frame_rate(&self) -> Framerate {
        self.frame_rate
    }

    /// Container duration in seconds (0 when the container does not report one)
    pub fn duration_seconds(&self) -> f64 {
        self.duration
    }

    /// Whether the source carries an audio stream
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Decode the next frame into `frame`.
    ///
    /// Returns `false` once the stream is fully drained, including frames
    /// the decoder held back for reordering. A zero-frame source simply
    /// returns `false` on the first call.
    pub fn next_frame(&mut self, frame: &mut ffmpeg::frame::Video) -> Result<bool> {
        loop {
            match self.decoder.receive_frame(frame) {
                Ok(()) => return Ok(true),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    if self.eof_sent {
                        return Ok(false);
                    }
                    match self.read_video_packet() {
                        Some(packet) => self
                            .decoder
                            .send_packet(&packet)
                            .map_err(|e| Error::Decode(e.to_string()))?,
                        None => {
                            self.decoder
                                .send_eof()
                                .map_err(|e| Error::Decode(e.to_string()))?;
                            self.eof_sent = true;
                        }
                    }
                }
                Err(ffmpeg::Error::Eof) => return Ok(false),
                Err(e) => return Err(Error::Decode(e.to_string())),
            }
        }
    }

    /// Read demuxer packets until one belongs to the video stream.
    fn read_video_packet(&mut self) -> Option<ffmpeg::Packet> {
        loop {
            match self.ictx.packets().next() {
                Some((stream, packet)) if stream.index() == self.stream_index => {
                    return Some(packet)
                }
                Some(_) => continue,
                None => return None,
            }
        }
    }
}

/// Rotation requested by the container, if any.
///
/// Checks the legacy `rotate` metadata tag and the display-matrix side data
/// attached to the codec parameters (MP4/MOV rotation flags).
fn rotation_degrees(stream: &ffmpeg::format::stream::Stream) -> Option<f64> {
    if let Some(rotate) = stream.metadata().get("rotate") {
        if let Ok(angle) = rotate.parse::<f64>() {
            if angle.abs() > 0.5 {
                return Some(angle);
            }
        }
    }

    let params = stream.parameters();
    unsafe {
        let par = params.as_ptr();
        if par.is_null() {
            return None;
        }
        let count = (*par).nb_coded_side_data as usize;
        let side_data = (*par).coded_side_data;
        if side_data.is_null() {
            return None;
        }
        for i in 0..count {
            let entry = side_data.add(i);
            if (*entry).type_
                != ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX
            {
                continue;
            }
            if (*entry).size < 9 * std::mem::size_of::<i32>() || (*entry).data.is_null() {
                continue;
            }
            let matrix = std::slice::from_raw_parts((*entry).data as *const i32, 9);
            let angle = display_matrix_rotation(matrix);
            if angle.abs() > 0.5 {
                return Some(angle);
            }
        }
    }

    None
}

/// Rotation angle encoded in a display matrix (16.16 fixed point), in degrees.
fn display_matrix_rotation(matrix: &[i32]) -> f64 {
    let m0 = matrix[0] as f64 / 65536.0;
    let m1 = matrix[1] as f64 / 65536.0;
    if m0 == 0.0 && m1 == 0.0 {
        return 0.0;
    }
    m1.atan2(m0).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matrix_has_no_rotation() {
        let identity = [65536, 0, 0, 0, 65536, 0, 0, 0, 1 << 30];
        assert_eq!(display_matrix_rotation(&identity), 0.0);
    }

    #[test]
    fn quarter_turn_matrix_reports_90_degrees() {
        // 90-degree rotation as written by mobile recorders
        let rotated = [0, 65536, 0, -65536, 0, 0, 0, 0, 1 << 30];
        assert!((display_matrix_rotation(&rotated).abs() - 90.0).abs() < 0.1);
    }

    #[test]
    fn missing_file_surfaces_open_error() {
        let err = VideoStream::open(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, Error::Open(_)));
    }
}
