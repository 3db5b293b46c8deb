//! Conversion job runner
//!
//! One conversion = one background worker thread. The worker opens the
//! source, stages the audio track, runs the per-frame letterbox pipeline
//! into the encoder/muxer, and emits exactly one terminal [`JobEvent`]
//! over a channel. All FFmpeg contexts drop on every exit path.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ffmpeg_next as ffmpeg;

use crate::config::ConvertConfig;
use crate::decode::VideoStream;
use crate::encode::{self, StagedAudio, VideoEncoder};
use crate::error::{Error, Result};
use crate::geometry::Transform;
use crate::muxer::Muxer;
use crate::processing::FramePipeline;

/// Terminal event of one conversion job
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Conversion finished and the destination file is complete
    Completed { output: PathBuf },
    /// Conversion aborted; the message is shown to the user verbatim.
    /// A partially written destination file may remain.
    Failed { message: String },
}

/// Handle to a running conversion worker
pub struct JobHandle {
    events: Receiver<JobEvent>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Non-blocking poll for the terminal event.
    ///
    /// A worker that died without reporting surfaces as a failure so the
    /// caller never waits on a disconnected channel.
    pub fn try_event(&self) -> Option<JobEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => Some(JobEvent::Failed {
                message: "conversion worker exited without reporting".into(),
            }),
        }
    }

    /// Block until the worker finishes and return its terminal event.
    pub fn wait(mut self) -> JobEvent {
        let event = self.events.recv().unwrap_or(JobEvent::Failed {
            message: "conversion worker exited without reporting".into(),
        });
        self.join();
        event
    }

    /// Reap the worker thread once its terminal event has been observed.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// One source-to-destination conversion
pub struct ConversionJob {
    input: PathBuf,
    output: PathBuf,
    config: ConvertConfig,
}

impl ConversionJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config: ConvertConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ConvertConfig) -> Self {
        self.config = config;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Spawn the background worker and return its handle.
    pub fn spawn(self) -> JobHandle {
        let (tx, rx) = bounded::<JobEvent>(1);
        let thread = std::thread::spawn(move || self.run_and_report(tx));
        JobHandle {
            events: rx,
            thread: Some(thread),
        }
    }

    fn run_and_report(&self, events: Sender<JobEvent>) {
        let event = match self.run() {
            Ok(()) => {
                tracing::info!("Conversion finished: {}", self.output.display());
                JobEvent::Completed {
                    output: self.output.clone(),
                }
            }
            Err(e) => {
                tracing::error!("Conversion failed: {}", e);
                JobEvent::Failed {
                    message: e.to_string(),
                }
            }
        };
        let _ = events.send(event);
    }

    /// Run the conversion to completion on the calling thread.
    pub fn run(&self) -> Result<()> {
        ffmpeg::init().map_err(|e| Error::Ffmpeg(e.to_string()))?;

        let mut source = VideoStream::open(&self.input)?;
        tracing::info!(
            "Opened {}: {} @ {}, {:.2}s",
            self.input.display(),
            source.resolution(),
            source.frame_rate(),
            source.duration_seconds()
        );

        let transform = Transform::fit(source.resolution(), self.config.canvas)?;
        tracing::info!(
            "Letterbox: scale {:.4}, {} at +{}+{}",
            transform.scale,
            transform.fitted(),
            transform.x_offset,
            transform.y_offset
        );

        // Stage the audio track first; the guard removes the scratch
        // artifact when this function returns, on any path.
        let staged: Option<StagedAudio> = if source.has_audio() {
            encode::audio::stage(&self.input, &self.config)?
        } else {
            None
        };

        let mut muxer = Muxer::create(&self.output)?;
        let mut encoder = VideoEncoder::new(
            &self.config,
            self.config.canvas.resolution(),
            source.frame_rate(),
            muxer.global_header(),
        )?;
        muxer.add_video_stream(&encoder)?;

        let mut audio_feed = match &staged {
            Some(staged) => Some(AudioFeed::open(staged.path())?),
            None => None,
        };
        if let Some(feed) = &audio_feed {
            muxer.add_audio_copy_stream(feed.parameters()?, feed.time_base())?;
        }

        muxer.write_header()?;

        let mut pipeline =
            FramePipeline::new(self.config.canvas, transform, source.resolution())?;

        let mut frame = ffmpeg::frame::Video::empty();
        while source.next_frame(&mut frame)? {
            let mut composed = pipeline.process(&frame)?;
            for packet in encoder.encode(&mut composed)? {
                muxer.write_video(packet)?;
            }
            if let Some(feed) = &mut audio_feed {
                feed.copy_until(encoder.clock_seconds(), &mut muxer)?;
            }
        }

        for packet in encoder.finish()? {
            muxer.write_video(packet)?;
        }
        if let Some(feed) = &mut audio_feed {
            feed.copy_remaining(&mut muxer)?;
        }
        muxer.finish()?;

        tracing::info!(
            "Wrote {} frames to {}",
            encoder.frames_sent(),
            self.output.display()
        );
        Ok(())
    }
}

/// Reads the staged audio artifact back for stream-copy into the output,
/// interleaved against the video clock.
struct AudioFeed {
    ictx: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    pending: Option<ffmpeg::Packet>,
    finished: bool,
}

impl AudioFeed {
    fn open(path: &Path) -> Result<Self> {
        let ictx = ffmpeg::format::input(&path).map_err(|e| Error::Open(e.to_string()))?;
        let (stream_index, time_base) = {
            let stream = ictx
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| Error::Muxer("staged audio artifact has no stream".into()))?;
            (stream.index(), stream.time_base())
        };
        Ok(Self {
            ictx,
            stream_index,
            time_base,
            pending: None,
            finished: false,
        })
    }

    fn parameters(&self) -> Result<ffmpeg::codec::Parameters> {
        Ok(self
            .ictx
            .stream(self.stream_index)
            .ok_or_else(|| Error::Muxer("staged audio stream missing".into()))?
            .parameters())
    }

    fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Copy packets whose timestamp is at or before `until` seconds.
    fn copy_until(&mut self, until: f64, muxer: &mut Muxer) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        loop {
            if self.pending.is_none() {
                self.pending = self.next_packet();
                if self.pending.is_none() {
                    self.finished = true;
                    return Ok(());
                }
            }

            let seconds = self
                .pending
                .as_ref()
                .and_then(|p| p.pts())
                .map(|pts| pts as f64 * f64::from(self.time_base))
                .unwrap_or(0.0);
            if seconds > until {
                return Ok(());
            }

            let packet = self.pending.take().expect("pending packet checked above");
            muxer.write_audio(packet)?;
        }
    }

    /// Copy everything left in the artifact.
    fn copy_remaining(&mut self, muxer: &mut Muxer) -> Result<()> {
        self.copy_until(f64::INFINITY, muxer)
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
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
