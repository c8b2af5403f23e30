//! MP4 segment output (H.264 via openh264, muxed by muxide)
//!
//! Run with: cargo test --test mp4_props --features recording

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{Local, TimeZone};
use crabwatch::recording::{Container, H264Encoder, Mp4Sink, SegmentManager, SegmentSink};
use crabwatch::testing::{ScriptedDetector, SyntheticSource};
use crabwatch::{Frame, MotionPipeline, VideoFormat};
use proptest::prelude::*;
use tempfile::tempdir;

// ═══════════════════════════════════════════════════════════════════════════
// H264 ENCODER INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// INVARIANT: Encoded frames are valid Annex B format
    #[test]
    fn encoded_frames_are_annex_b(gray_level in 0u8..255) {
        let mut encoder = H264Encoder::new(160, 120).unwrap();
        let encoded = encoder.encode_rgb(&vec![gray_level; 160 * 120 * 3]).unwrap();

        prop_assert!(
            encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1]),
            "Encoded frame should start with Annex B prefix, got: {:02x?}",
            &encoded.data[..encoded.data.len().min(10)]
        );
        prop_assert!(encoded.is_keyframe);
    }

    /// INVARIANT: Odd dimensions are rejected before any file is created
    #[test]
    fn odd_dimensions_create_no_file(w in 1u32..100, h in 1u32..100) {
        prop_assume!(w % 2 == 1 || h % 2 == 1);
        let dir = tempdir().unwrap();
        let path = dir.path().join("odd.mp4");
        let result = Mp4Sink::default().create(&path, &VideoFormat::new(w, h, 30.0));
        prop_assert!(result.is_err());
        prop_assert!(!path.exists());
    }
}

#[test]
fn mp4_is_default_container_with_recording() {
    assert_eq!(Container::default(), Container::Mp4);
    assert_eq!(Container::Mp4.sink().unwrap().extension(), "mp4");
}

#[test]
fn writer_counts_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let mut writer = Mp4Sink::default()
        .create(&path, &VideoFormat::new(320, 240, 15.0))
        .unwrap();

    for i in 0..15u8 {
        let frame = Frame::new(vec![i * 10; 320 * 240 * 3], 320, 240).with_sequence(i as u64);
        writer.write_frame(&frame).unwrap();
    }
    let stats = writer.finish().unwrap();

    assert_eq!(stats.frames_written, 15);
    assert!(stats.bytes_written > 0);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn pipeline_writes_playable_mp4_segment() {
    let dir = tempdir().unwrap();
    let epoch = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap();

    let mut pipeline = MotionPipeline::new(
        SyntheticSource::still(64, 48, 10.0, 40),
        ScriptedDetector::windows(vec![(0.0, 0.5)]),
        SegmentManager::new(dir.path(), Container::Mp4.sink().unwrap()),
        Duration::from_secs(1),
    )
    .unwrap()
    .with_epoch(epoch);

    let summary = pipeline.run(&AtomicBool::new(false)).unwrap();

    assert_eq!(summary.segments.len(), 1);
    let segment = &summary.segments[0];
    assert_eq!(segment.id, "2024-06-01_12-00-00");
    assert!(segment.path.extension().is_some_and(|e| e == "mp4"));
    // 0.0 ..= 1.5 appended, 1.6 stops
    assert_eq!(segment.frames_appended, 16);
    assert!(segment.frames_written > 0);
    assert!(segment.frames_written <= segment.frames_appended);

    let bytes = std::fs::read(&segment.path).unwrap();
    assert_eq!(&bytes[4..8], b"ftyp");
}
