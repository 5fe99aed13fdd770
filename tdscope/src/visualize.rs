//! Visualization workflow.
//!
//! Loads a bounded window of one channel and prepares the two pairs of
//! arrays a plotter needs: amplitude against time, and magnitude against
//! frequency. Rendering is left to whatever consumes [`SignalPlot`].

use serde::Serialize;
use tracing::info;

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::file::MeasurementFile;
use crate::spectrum::{Spectrum, time_axis};

/// Time-domain arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeDomain {
    /// Time of each sample in seconds.
    pub time_s: Vec<f64>,
    /// Sample values.
    pub amplitude: Vec<f64>,
}

/// Everything needed to plot a channel window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPlot {
    /// Group the channel belongs to.
    pub group: String,
    /// Channel name.
    pub channel: String,
    /// Sampling rate used for both axes.
    pub sample_rate_hz: f64,
    /// Samples in the whole channel.
    pub total_points: u64,
    /// Samples actually loaded.
    pub loaded_points: usize,
    /// Amplitude against time.
    pub time_domain: TimeDomain,
    /// Magnitude against frequency.
    pub frequency_domain: Spectrum,
}

impl SignalPlot {
    /// Duration covered by the loaded window, in seconds.
    pub fn window_seconds(&self) -> f64 {
        self.time_domain.time_s.last().copied().unwrap_or(0.0)
    }
}

/// Runs the visualization workflow described by `config`.
///
/// # Errors
///
/// Returns [`ScopeError::Config`](crate::ScopeError::Config) for an invalid
/// configuration, [`ScopeError::FileRead`](crate::ScopeError::FileRead) if
/// the file cannot be read,
/// [`ScopeError::ChannelNotFound`](crate::ScopeError::ChannelNotFound) if the
/// channel does not exist, and a sampling error if no usable rate can be
/// determined.
pub fn visualize(config: &WorkflowConfig) -> Result<SignalPlot> {
    config.validate()?;

    info!(path = %config.file_path.display(), "loading measurement file");
    let file = MeasurementFile::open(&config.file_path)?;
    let channel = file.channel(&config.group_name, &config.channel_name)?;

    let fs = config.rate_policy().resolve(&channel)?;
    let total_points = channel.len();
    info!(rate_khz = fs / 1000.0, total_points, "channel resolved");

    match config.window_duration_seconds {
        Some(seconds) => info!(seconds, "reading window"),
        None => info!("reading the entire channel"),
    }
    let amplitude = channel.read_window(config.window())?;
    let loaded_points = amplitude.len();

    let frequency_domain = Spectrum::compute(&amplitude, fs);
    if let Some((freq, magnitude)) = frequency_domain.peak() {
        info!(peak_hz = freq, magnitude, loaded_points, "spectrum computed");
    }

    Ok(SignalPlot {
        group: config.group_name.clone(),
        channel: config.channel_name.clone(),
        sample_rate_hz: fs,
        total_points,
        loaded_points,
        time_domain: TimeDomain {
            time_s: time_axis(loaded_points, fs),
            amplitude,
        },
        frequency_domain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeError;
    use crate::file::WF_INCREMENT;
    use crate::writer::{ChannelData, Segment, TdmsWriter};
    use std::f64::consts::PI;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(path: &Path, segment: Segment) {
        let mut writer = TdmsWriter::create(path).unwrap();
        writer.write_segment(&segment).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_window_and_spectrum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.tdms");
        // 2048 samples at 1024 Hz; a 0.5 s window keeps 512 samples.
        let signal: Vec<f64> = (0..2048)
            .map(|i| 0.2 + 1.5 * (2.0 * PI * 32.0 * f64::from(i) / 1024.0).sin())
            .collect();
        write(
            &path,
            Segment::new()
                .channel("Log", "Dev1/ai0", ChannelData::F64(signal))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 1.0 / 1024.0),
        );

        let mut config = WorkflowConfig::new(&path);
        config.window_duration_seconds = Some(0.5);
        let plot = visualize(&config).unwrap();

        assert_eq!(plot.total_points, 2048);
        assert_eq!(plot.loaded_points, 512);
        assert_eq!(plot.time_domain.amplitude.len(), 512);
        assert_eq!(plot.time_domain.time_s.len(), 512);
        assert!((plot.window_seconds() - 0.5).abs() < 1e-12);

        let spectrum = &plot.frequency_domain;
        assert_eq!(spectrum.len(), 256);
        let (freq, magnitude) = spectrum.peak().unwrap();
        assert!((freq - 32.0).abs() < 1e-9);
        assert!((magnitude - 1.5).abs() < 1e-9);
        assert!(spectrum.magnitudes[0].abs() < 1e-9);
    }

    #[test]
    fn test_missing_rate_needs_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("norate.tdms");
        write(
            &path,
            Segment::new().channel("Log", "Dev1/ai0", ChannelData::F64(vec![0.0; 100])),
        );

        let mut config = WorkflowConfig::new(&path);
        assert!(matches!(
            visualize(&config).unwrap_err(),
            ScopeError::MissingSamplingRate { .. }
        ));

        config.fallback_rate_hz = Some(1_000_000.0);
        let plot = visualize(&config).unwrap();
        assert_eq!(plot.sample_rate_hz, 1_000_000.0);
        assert_eq!(plot.loaded_points, 100);
    }

    #[test]
    fn test_entire_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("all.tdms");
        write(
            &path,
            Segment::new()
                .channel("Log", "Dev1/ai0", ChannelData::I16(vec![1, 2, 3, 4]))
                .channel_property("Log", "Dev1/ai0", WF_INCREMENT, 0.25),
        );
        let mut config = WorkflowConfig::new(&path);
        config.window_duration_seconds = None;
        let plot = visualize(&config).unwrap();
        assert_eq!(plot.time_domain.amplitude, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(plot.time_domain.time_s, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_opening() {
        let mut config = WorkflowConfig::new("/nonexistent.tdms");
        config.window_duration_seconds = Some(f64::NAN);
        assert!(matches!(visualize(&config).unwrap_err(), ScopeError::Config(_)));
    }
}
