//! Length and determinism properties of windowed reads.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use tdscope::file::WF_INCREMENT;
use tdscope::writer::{ChannelData, Segment, TdmsWriter};
use tdscope::{MeasurementFile, SamplingWindow};
use tempfile::{TempDir, tempdir};

const LENGTHS: [usize; 6] = [0, 1, 2, 7, 64, 1000];

/// One group per interesting channel length, each channel sampled at 1 kHz.
fn fixture() -> (TempDir, MeasurementFile) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("bounds.tdms");

    let mut segment = Segment::new();
    for len in LENGTHS {
        let name = format!("len_{len}");
        let values: Vec<f32> = (0..len).map(|i| i as f32).collect();
        segment = segment
            .channel("Bounds", &name, ChannelData::F32(values))
            .channel_property("Bounds", &name, WF_INCREMENT, 0.001);
    }
    let mut writer = TdmsWriter::create(&path).unwrap();
    writer.write_segment(&segment).unwrap();
    writer.finish().unwrap();

    let file = MeasurementFile::open(&path).unwrap();
    (temp_dir, file)
}

#[test]
fn test_preview_returns_min_of_n_and_length() {
    let (_dir, file) = fixture();
    for channel in file.group("Bounds").unwrap().channels() {
        let len = channel.len();
        for n in [0u64, 1, 5, 64, 5000] {
            let preview = channel.preview(n).unwrap();
            assert_eq!(
                preview.len() as u64,
                n.min(len),
                "channel {} preview({n})",
                channel.name()
            );
        }
    }
}

#[test]
fn test_duration_window_returns_min_of_count_and_length() {
    let (_dir, file) = fixture();
    for channel in file.group("Bounds").unwrap().channels() {
        let len = channel.len();
        for seconds in [0.0, 0.001, 0.0075, 0.5, 3.0, 1e9] {
            let samples = channel.read_window(SamplingWindow::duration(seconds)).unwrap();
            let requested = (seconds * 1000.0_f64).floor() as u64;
            assert_eq!(
                samples.len() as u64,
                requested.min(len),
                "channel {} duration {seconds}",
                channel.name()
            );
        }
    }
}

#[test]
fn test_span_window_values_match_positions() {
    let (_dir, file) = fixture();
    let channel = file.channel("Bounds", "len_1000").unwrap();
    for (start, count) in [(0, 10), (500, 3), (995, 20), (1000, 1), (5000, 5)] {
        let samples = channel.read_window(SamplingWindow::span(start, count)).unwrap();
        let expected: Vec<f64> = (start..1000.min(start + count)).map(|i| i as f64).collect();
        assert_eq!(samples, expected, "span ({start}, {count})");
    }
}

#[test]
fn test_listing_is_stable_across_calls_and_reopens() {
    let (dir, file) = fixture();
    let names = |file: &MeasurementFile| -> Vec<String> {
        file.groups()
            .flat_map(|g| {
                g.channels()
                    .map(|c| format!("{}/{}", g.name(), c.name()))
                    .collect::<Vec<_>>()
            })
            .collect()
    };
    let first = names(&file);
    assert_eq!(first, names(&file));
    assert_eq!(first.len(), LENGTHS.len());

    let reopened = MeasurementFile::open(dir.path().join("bounds.tdms")).unwrap();
    assert_eq!(first, names(&reopened));
}
