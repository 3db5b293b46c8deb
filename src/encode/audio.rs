//! AAC audio staging
//!
//! The source audio track is decoded, resampled to 44.1 kHz stereo FLTP,
//! AAC-encoded and written to a scratch artifact in the OS temp directory.
//! During the final mux the artifact is stream-copied into the MP4; the
//! [`StagedAudio`] guard removes it afterwards regardless of outcome.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::channel_layout::ChannelLayout;
use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample;
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::software::resampling;
use tempfile::NamedTempFile;

use crate::config::ConvertConfig;
use crate::error::{Error, Result};

/// FFmpeg encoder name used for the audio stream
pub const ENCODER_NAME: &str = "aac";

/// File-name prefix of the scratch artifact in the OS temp directory
pub const SCRATCH_PREFIX: &str = "shortbox-audio-";

/// Stereo FLTP sample buffer feeding fixed-size AAC input frames.
///
/// Decoded audio arrives in arbitrary chunk sizes while AAC wants exactly
/// `frame_size` samples per input frame; the remainder carries over between
/// pushes. Mono input fills both channels from plane 0.
struct SampleFifo {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl SampleFifo {
    fn new() -> Self {
        Self {
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Buffered samples per channel
    fn len(&self) -> usize {
        self.left.len()
    }

    /// Append one FLTP frame (stereo or mono).
    fn push(&mut self, frame: &ffmpeg::frame::Audio) {
        let samples = frame.samples();
        if samples == 0 {
            return;
        }
        self.left.extend_from_slice(&frame.plane::<f32>(0)[..samples]);
        let right_plane = if frame.channels() >= 2 { 1 } else { 0 };
        self.right
            .extend_from_slice(&frame.plane::<f32>(right_plane)[..samples]);
    }

    /// Pop one encoder-sized frame; the tail is zero-padded when fewer than
    /// `samples` remain (only used for the final flush frame).
    fn pop(&mut self, samples: usize, pts: i64, rate: u32) -> ffmpeg::frame::Audio {
        let available = self.left.len().min(samples);

        let mut frame = ffmpeg::frame::Audio::new(
            Sample::F32(SampleType::Planar),
            samples,
            ChannelLayout::STEREO,
        );
        frame.set_rate(rate);
        frame.set_pts(Some(pts));

        let left = frame.plane_mut::<f32>(0);
        left[..available].copy_from_slice(&self.left[..available]);
        left[available..].fill(0.0);
        let right = frame.plane_mut::<f32>(1);
        right[..available].copy_from_slice(&self.right[..available]);
        right[available..].fill(0.0);

        self.left.drain(..available);
        self.right.drain(..available);

        frame
    }
}

/// AAC encoder over a sample FIFO.
///
/// Input frames must already be FLTP at the configured rate; PTS is a
/// running sample counter in the 1/sample_rate timebase.
pub struct AacEncoder {
    encoder: ffmpeg::encoder::Audio,
    fifo: SampleFifo,
    frame_size: usize,
    sample_rate: i32,
    next_pts: i64,
}

impl AacEncoder {
    /// Check whether the AAC encoder is available in the linked FFmpeg build
    pub fn is_available() -> bool {
        ffmpeg::init().is_ok() && ffmpeg::encoder::find_by_name(ENCODER_NAME).is_some()
    }

    pub fn new(config: &ConvertConfig, global_header: bool) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

        let codec = ffmpeg::encoder::find_by_name(ENCODER_NAME)
            .ok_or_else(|| Error::EncoderInit(format!("{} encoder not found", ENCODER_NAME)))?;

        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let mut encoder = context
            .encoder()
            .audio()
            .map_err(|e| Error::EncoderInit(e.to_string()))?;

        // Configure through the raw context; the channel layout must go
        // through the FFmpeg 7+ ch_layout API.
        unsafe {
            let ctx = encoder.as_mut_ptr();
            (*ctx).sample_rate = config.audio_sample_rate;
            (*ctx).sample_fmt = ffmpeg::ffi::AVSampleFormat::AV_SAMPLE_FMT_FLTP;
            (*ctx).bit_rate = config.audio_bitrate as i64;
            (*ctx).time_base = ffmpeg::ffi::AVRational {
                num: 1,
                den: config.audio_sample_rate,
            };
            ffmpeg::ffi::av_channel_layout_default(&mut (*ctx).ch_layout, 2);
            if global_header {
                (*ctx).flags |= ffmpeg::ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let opened = encoder
            .open()
            .map_err(|e| Error::EncoderInit(format!("Failed to open {}: {}", ENCODER_NAME, e)))?;

        let frame_size = match unsafe { (*opened.as_ptr()).frame_size } {
            size if size > 0 => size as usize,
            _ => 1024,
        };

        Ok(Self {
            encoder: opened,
            fifo: SampleFifo::new(),
            frame_size,
            sample_rate: config.audio_sample_rate,
            next_pts: 0,
        })
    }

    /// Encoder timebase (1/sample_rate) for packet rescaling
    pub fn time_base(&self) -> ffmpeg::Rational {
        ffmpeg::Rational::new(1, self.sample_rate)
    }

    pub(crate) fn inner(&self) -> &ffmpeg::encoder::Audio {
        &self.encoder
    }

    /// Queue decoded samples; returns any packets that became ready.
    pub fn encode(&mut self, frame: &ffmpeg::frame::Audio) -> Result<Vec<ffmpeg::Packet>> {
        self.fifo.push(frame);
        self.drain(false)
    }

    /// Zero-pad and flush the FIFO tail, then drain the encoder.
    pub fn finish(&mut self) -> Result<Vec<ffmpeg::Packet>> {
        let mut packets = self.drain(true)?;
        self.encoder
            .send_eof()
            .map_err(|e| Error::EncodingFailed(format!("Failed to send EOF: {}", e)))?;
        packets.extend(self.receive()?);
        Ok(packets)
    }

    fn drain(&mut self, flush: bool) -> Result<Vec<ffmpeg::Packet>> {
        let mut packets = Vec::new();
        while self.fifo.len() >= self.frame_size || (flush && self.fifo.len() > 0) {
            let frame = self
                .fifo
                .pop(self.frame_size, self.next_pts, self.sample_rate as u32);
            self.next_pts += self.frame_size as i64;

            self.encoder
                .send_frame(&frame)
                .map_err(|e| Error::EncodingFailed(format!("Failed to send samples: {}", e)))?;
            packets.extend(self.receive()?);
        }
        Ok(packets)
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

/// Staged AAC artifact in the OS scratch directory.
///
/// The file is deleted when this guard drops, on success and failure alike.
pub struct StagedAudio {
    file: NamedTempFile,
}

impl StagedAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Transcode the source's audio track into a scratch artifact.
///
/// Returns `None` when the source has no audio stream.
pub fn stage(input: &Path, config: &ConvertConfig) -> Result<Option<StagedAudio>> {
    ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

    let mut ictx = ffmpeg::format::input(&input).map_err(|e| Error::Open(e.to_string()))?;

    let (stream_index, parameters) = {
        let stream = match ictx.streams().best(MediaType::Audio) {
            Some(stream) => stream,
            None => return Ok(None),
        };
        (stream.index(), stream.parameters())
    };

    let codec_ctx = ffmpeg::codec::context::Context::from_parameters(parameters)
        .map_err(|e| Error::Decode(e.to_string()))?;
    let mut decoder = codec_ctx
        .decoder()
        .audio()
        .map_err(|e| Error::Decode(e.to_string()))?;

    let file = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(".m4a")
        .tempfile()?;

    let mut octx = ffmpeg::format::output_as(&file.path(), "mp4")
        .map_err(|e| Error::Muxer(format!("Failed to create audio scratch file: {}", e)))?;

    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);
    let mut encoder = AacEncoder::new(config, global_header)?;

    {
        let codec = ffmpeg::encoder::find_by_name(ENCODER_NAME)
            .ok_or_else(|| Error::EncoderInit(format!("{} encoder not found", ENCODER_NAME)))?;
        let mut ost = octx
            .add_stream(codec)
            .map_err(|e| Error::Muxer(format!("Failed to add audio stream: {}", e)))?;
        ost.set_parameters(encoder.inner());
        ost.set_time_base(encoder.time_base());
    }

    octx.write_header()
        .map_err(|e| Error::Muxer(format!("Failed to write header: {}", e)))?;
    let ost_time_base = octx
        .stream(0)
        .ok_or_else(|| Error::Muxer("audio scratch stream missing".into()))?
        .time_base();

    let target_format = Sample::F32(SampleType::Planar);
    let target_rate = config.audio_sample_rate as u32;
    let mut resampler: Option<resampling::Context> = None;

    let mut write = |packets: Vec<ffmpeg::Packet>,
                     octx: &mut ffmpeg::format::context::Output|
     -> Result<()> {
        for mut packet in packets {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg::Rational::new(1, config.audio_sample_rate), ost_time_base);
            packet
                .write_interleaved(octx)
                .map_err(|e| Error::Muxer(format!("Failed to write audio packet: {}", e)))?;
        }
        Ok(())
    };

    let mut raw = ffmpeg::frame::Audio::empty();
    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| Error::Decode(e.to_string()))?;
        while decoder.receive_frame(&mut raw).is_ok() {
            let packets =
                encode_resampled(&raw, &mut resampler, &mut encoder, target_format, target_rate)?;
            write(packets, &mut octx)?;
        }
    }

    // Drain frames the decoder held back
    decoder
        .send_eof()
        .map_err(|e| Error::Decode(e.to_string()))?;
    while decoder.receive_frame(&mut raw).is_ok() {
        let packets =
            encode_resampled(&raw, &mut resampler, &mut encoder, target_format, target_rate)?;
        write(packets, &mut octx)?;
    }

    let packets = encoder.finish()?;
    write(packets, &mut octx)?;

    octx.write_trailer()
        .map_err(|e| Error::Muxer(format!("Failed to write trailer: {}", e)))?;

    tracing::debug!("Staged audio track at {}", file.path().display());
    Ok(Some(StagedAudio { file }))
}

/// Resample `raw` to the encoder's format if needed, then encode it.
fn encode_resampled(
    raw: &ffmpeg::frame::Audio,
    resampler: &mut Option<resampling::Context>,
    encoder: &mut AacEncoder,
    target_format: Sample,
    target_rate: u32,
) -> Result<Vec<ffmpeg::Packet>> {
    let needs_resample =
        raw.format() != target_format || raw.rate() != target_rate || raw.channels() != 2;

    if !needs_resample {
        return encoder.encode(raw);
    }

    if resampler.is_none() {
        // Declare the input by channel count; decoders do not always fill
        // in a named layout.
        let src_layout = ChannelLayout::default(raw.channels() as i32);
        *resampler = Some(
            resampling::Context::get(
                raw.format(),
                src_layout,
                raw.rate(),
                target_format,
                ChannelLayout::STEREO,
                target_rate,
            )
            .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?,
        );
    }
    let resampler = resampler.as_mut().expect("resampler initialized above");

    let mut resampled = ffmpeg::frame::Audio::empty();
    resampler
        .run(raw, &mut resampled)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
    if resampled.samples() == 0 {
        return Ok(Vec::new());
    }
    encoder.encode(&resampled)
}
