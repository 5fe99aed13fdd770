//! Microbenchmarks for windowed reads and the spectrum.
//!
//! Measures how read cost scales with window length and segment count, and
//! the cost of the transform applied to each window.
//!
//! Run with: `cargo bench -p tdscope -- window`

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tdscope::file::WF_INCREMENT;
use tdscope::writer::{ChannelData, Segment, TdmsWriter};
use tdscope::{MeasurementFile, SamplingWindow, Spectrum};
use tempfile::tempdir;

const TOTAL_SAMPLES: usize = 1_000_000;

/// Writes a 1 MHz channel of `TOTAL_SAMPLES` split across `segments` segments.
fn setup_file(segments: usize) -> (MeasurementFile, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("bench.tdms");

    let chunk = TOTAL_SAMPLES / segments;
    let block = |s: usize| {
        ChannelData::F64((s * chunk..(s + 1) * chunk).map(|i| i as f64).collect())
    };

    let mut writer = TdmsWriter::create(&path).unwrap();
    writer
        .write_segment(
            &Segment::new()
                .channel("Log", "Dev1/ai0", block(0))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 1e-6),
        )
        .unwrap();
    for s in 1..segments {
        writer.write_segment(&Segment::continuation(vec![block(s)])).unwrap();
    }
    writer.finish().unwrap();

    (MeasurementFile::open(&path).unwrap(), temp_dir)
}

fn bench_read_window(c: &mut Criterion) {
    let (file, _dir) = setup_file(1);
    let channel = file.channel("Log", "Dev1/ai0").unwrap();
    let mut group = c.benchmark_group("window/read_duration");

    for seconds in [0.001, 0.01, 0.1, 1.0] {
        group.bench_with_input(BenchmarkId::from_parameter(seconds), &seconds, |b, &s| {
            b.iter(|| {
                channel
                    .read_window(black_box(SamplingWindow::duration(s)))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_read_segmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("window/segments");

    for segments in [1, 10, 100, 1000] {
        let (file, _dir) = setup_file(segments);
        let channel = file.channel("Log", "Dev1/ai0").unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(segments), &segments, |b, _| {
            b.iter(|| {
                channel
                    .read_window(black_box(SamplingWindow::span(250_000, 100_000)))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let (file, _dir) = setup_file(1000);
    let path = file.path().to_path_buf();

    c.bench_function("window/open_1000_segments", |b| {
        b.iter(|| MeasurementFile::open(black_box(&path)).unwrap());
    });
}

fn bench_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("window/spectrum");

    for n in [1_024, 10_000, 65_536] {
        let samples: Vec<f64> = (0..n).map(|i| (i as f64 * 0.01).sin()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &samples, |b, samples| {
            b.iter(|| Spectrum::compute(black_box(samples), 1_000_000.0));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_read_window,
    bench_read_segmented,
    bench_open,
    bench_spectrum
);
criterion_main!(benches);
