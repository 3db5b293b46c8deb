//! End-to-end conversion tests
//!
//! A small source clip is synthesized with the crate's own encoder/muxer,
//! converted, and the result probed. Tests skip when the linked FFmpeg
//! build lacks libx264 or AAC.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use serial_test::serial;

use shortbox::{
    AacEncoder, ConversionJob, ConvertConfig, Framerate, JobEvent, Muxer, Resolution,
    VideoEncoder, VideoStream,
};

const FPS: u32 = 30;
const AUDIO_RATE: usize = 44_100;
const AAC_FRAME: usize = 1024;

fn encoders_available() -> bool {
    if !VideoEncoder::is_available() || !AacEncoder::is_available() {
        eprintln!("libx264/aac not available, skipping test");
        return false;
    }
    true
}

/// Write a test clip: flat gray frames, optional silent stereo audio.
fn write_test_clip(path: &Path, width: u32, height: u32, seconds: f64, with_audio: bool) {
    let config = ConvertConfig::default();
    let mut muxer = Muxer::create(path).expect("create test clip muxer");

    let mut video = VideoEncoder::new(
        &config,
        Resolution::new(width, height),
        Framerate::new(FPS, 1),
        muxer.global_header(),
    )
    .expect("create test video encoder");
    muxer.add_video_stream(&video).expect("add video stream");

    let mut audio = if with_audio {
        let encoder = AacEncoder::new(&config, muxer.global_header()).expect("create aac encoder");
        muxer.add_audio_stream(&encoder).expect("add audio stream");
        Some(encoder)
    } else {
        None
    };

    muxer.write_header().expect("write header");

    let frames = (seconds * FPS as f64).round() as usize;
    for _ in 0..frames {
        let mut frame =
            ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, width, height);
        frame.data_mut(0).fill(128);
        frame.data_mut(1).fill(128);
        frame.data_mut(2).fill(128);
        for packet in video.encode(&mut frame).expect("encode frame") {
            muxer.write_video(packet).expect("write video packet");
        }
    }
    for packet in video.finish().expect("flush video encoder") {
        muxer.write_video(packet).expect("write video packet");
    }

    if let Some(encoder) = &mut audio {
        let chunks = (seconds * AUDIO_RATE as f64 / AAC_FRAME as f64).round() as usize;
        for _ in 0..chunks {
            let mut samples = ffmpeg::frame::Audio::new(
                ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
                AAC_FRAME,
                ffmpeg::channel_layout::ChannelLayout::STEREO,
            );
            samples.set_rate(AUDIO_RATE as u32);
            samples.plane_mut::<f32>(0).fill(0.0);
            samples.plane_mut::<f32>(1).fill(0.0);
            for packet in encoder.encode(&samples).expect("encode audio") {
                muxer.write_audio(packet).expect("write audio packet");
            }
        }
        for packet in encoder.finish().expect("flush audio encoder") {
            muxer.write_audio(packet).expect("write audio packet");
        }
    }

    muxer.finish().expect("finish test clip");
}

fn scratch_artifacts() -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(std::env::temp_dir()) {
        for entry in entries.flatten() {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(shortbox::encode::audio::SCRATCH_PREFIX)
            {
                found.push(entry.path());
            }
        }
    }
    found
}

#[test]
#[serial]
fn round_trip_produces_shorts_canvas_mp4() {
    if !encoders_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    write_test_clip(&source, 640, 360, 2.0, true);

    let output = dir.path().join("source_shorts.mp4");
    let event = ConversionJob::new(&source, &output).spawn().wait();
    match event {
        JobEvent::Completed { output: reported } => assert_eq!(reported, output),
        JobEvent::Failed { message } => panic!("conversion failed: {}", message),
    }

    let probe = VideoStream::open(&output).expect("output should be a valid MP4");
    assert_eq!(probe.resolution(), Resolution::new(1080, 1920));
    assert!(
        (probe.duration_seconds() - 2.0).abs() < 0.2,
        "duration drifted: {}",
        probe.duration_seconds()
    );
    assert!(probe.has_audio(), "audio track was not carried over");
}

#[test]
#[serial]
fn destination_is_overwritten() {
    if !encoders_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    write_test_clip(&source, 320, 240, 1.0, false);

    let output = dir.path().join("out.mp4");
    std::fs::write(&output, b"not a video").unwrap();

    let event = ConversionJob::new(&source, &output).spawn().wait();
    assert!(matches!(event, JobEvent::Completed { .. }));

    let probe = VideoStream::open(&output).expect("overwritten output should open");
    assert_eq!(probe.resolution(), Resolution::new(1080, 1920));
}

#[test]
#[serial]
fn zero_frame_source_produces_empty_output_without_crashing() {
    if !encoders_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.mp4");
    write_test_clip(&source, 640, 360, 0.0, false);

    let output = dir.path().join("empty_shorts.mp4");
    let event = ConversionJob::new(&source, &output).spawn().wait();
    match event {
        JobEvent::Completed { .. } => {}
        JobEvent::Failed { message } => panic!("empty source should convert: {}", message),
    }
    assert!(output.exists());
}

#[test]
#[serial]
fn missing_source_reports_failure_event() {
    let dir = tempfile::tempdir().unwrap();
    let event = ConversionJob::new(dir.path().join("missing.mp4"), dir.path().join("out.mp4"))
        .spawn()
        .wait();
    assert!(matches!(event, JobEvent::Failed { .. }));
}

#[test]
#[serial]
fn failed_mux_still_removes_scratch_audio() {
    if !encoders_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    write_test_clip(&source, 640, 360, 1.0, true);

    let before = scratch_artifacts();

    // Destination directory does not exist, so the muxer fails after the
    // audio track has already been staged.
    let output = dir.path().join("no-such-dir").join("out.mp4");
    let event = ConversionJob::new(&source, &output).spawn().wait();
    assert!(matches!(event, JobEvent::Failed { .. }));

    let after = scratch_artifacts();
    assert_eq!(
        after, before,
        "scratch audio artifact leaked after failed conversion"
    );
}
