//! MP4 muxing
//!
//! Writes the encoded video stream and the staged audio track into the
//! destination container. An existing destination file is overwritten.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::encode::{AacEncoder, VideoEncoder};
use crate::error::{Error, Result};

/// MP4 muxer for one conversion job
pub struct Muxer {
    octx: ffmpeg::format::context::Output,
    video_index: usize,
    video_time_base: ffmpeg::Rational,
    audio_index: Option<usize>,
    audio_time_base: Option<ffmpeg::Rational>,
    header_written: bool,
}

impl Muxer {
    /// Create the output context for `path`.
    pub fn create(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

        let octx = ffmpeg::format::output_as(&path, "mp4").map_err(|e| {
            Error::Muxer(format!("Failed to create output '{}': {}", path.display(), e))
        })?;

        Ok(Self {
            octx,
            video_index: 0,
            video_time_base: ffmpeg::Rational::new(1, 30),
            audio_index: None,
            audio_time_base: None,
            header_written: false,
        })
    }

    /// Whether the container wants codec extradata in global headers
    pub fn global_header(&self) -> bool {
        self.octx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER)
    }

    /// Add the video stream from an opened encoder.
    pub fn add_video_stream(&mut self, encoder: &VideoEncoder) -> Result<()> {
        let codec = ffmpeg::encoder::find_by_name(crate::encode::video::ENCODER_NAME);
        let mut stream = self
            .octx
            .add_stream(codec)
            .map_err(|e| Error::Muxer(format!("Failed to add video stream: {}", e)))?;
        stream.set_parameters(encoder.inner());
        stream.set_time_base(encoder.time_base());

        self.video_index = stream.index();
        self.video_time_base = encoder.time_base();
        Ok(())
    }

    /// Add an audio stream from an opened AAC encoder.
    pub fn add_audio_stream(&mut self, encoder: &AacEncoder) -> Result<()> {
        let codec = ffmpeg::encoder::find_by_name(crate::encode::audio::ENCODER_NAME);
        let mut stream = self
            .octx
            .add_stream(codec)
            .map_err(|e| Error::Muxer(format!("Failed to add audio stream: {}", e)))?;
        stream.set_parameters(encoder.inner());
        stream.set_time_base(encoder.time_base());

        self.audio_index = Some(stream.index());
        self.audio_time_base = Some(encoder.time_base());
        Ok(())
    }

    /// Add an audio stream by copying codec parameters from an input stream
    /// (used to carry the staged audio artifact over without re-encoding).
    pub fn add_audio_copy_stream(
        &mut self,
        parameters: ffmpeg::codec::Parameters,
        time_base: ffmpeg::Rational,
    ) -> Result<()> {
        let mut stream = self
            .octx
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| Error::Muxer(format!("Failed to add audio stream: {}", e)))?;
        stream.set_parameters(parameters);
        // The source container's codec tag rarely matches MP4; let the muxer
        // pick its own.
        unsafe {
            (*stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
        stream.set_time_base(time_base);

        self.audio_index = Some(stream.index());
        self.audio_time_base = Some(time_base);
        Ok(())
    }

    /// Write the container header. Streams must be added first.
    pub fn write_header(&mut self) -> Result<()> {
        let mut opts = ffmpeg::Dictionary::new();
        opts.set("movflags", "faststart");
        self.octx
            .write_header_with(opts)
            .map_err(|e| Error::Muxer(format!("Failed to write header: {}", e)))?;
        self.header_written = true;
        Ok(())
    }

    /// Write a video packet (timestamps in the video encoder's timebase).
    pub fn write_video(&mut self, packet: ffmpeg::Packet) -> Result<()> {
        let time_base = self.video_time_base;
        self.write(packet, self.video_index, time_base)
    }

    /// Write an audio packet (timestamps in the audio stream's timebase).
    pub fn write_audio(&mut self, packet: ffmpeg::Packet) -> Result<()> {
        let index = self
            .audio_index
            .ok_or_else(|| Error::Muxer("No audio stream configured".into()))?;
        let time_base = self
            .audio_time_base
            .ok_or_else(|| Error::Muxer("Audio time base not set".into()))?;
        self.write(packet, index, time_base)
    }

    fn write(
        &mut self,
        mut packet: ffmpeg::Packet,
        index: usize,
        src_time_base: ffmpeg::Rational,
    ) -> Result<()> {
        if !self.header_written {
            return Err(Error::Muxer("Muxer not started".into()));
        }

        packet.set_stream(index);
        let stream_time_base = self
            .octx
            .stream(index)
            .ok_or_else(|| Error::Muxer(format!("Stream {} not found", index)))?
            .time_base();
        packet.rescale_ts(src_time_base, stream_time_base);

        packet
            .write_interleaved(&mut self.octx)
            .map_err(|e| Error::Muxer(format!("Failed to write packet: {}", e)))
    }

    /// Finish muxing (write trailer).
    pub fn finish(&mut self) -> Result<()> {
        if !self.header_written {
            return Ok(());
        }
        self.octx
            .write_trailer()
            .map_err(|e| Error::Muxer(format!("Failed to write trailer: {}", e)))?;
        self.header_written = false;
        Ok(())
    }

    /// Whether an audio stream was configured
    pub fn has_audio(&self) -> bool {
        self.audio_index.is_some()
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        if self.header_written {
            let _ = self.octx.write_trailer();
        }
    }
}
