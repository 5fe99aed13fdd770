//! Sampling windows bounding how many samples a read materializes.
//!
//! A window never changes the channel; it only resolves to a concrete
//! `(start, count)` pair for one read. Both forms clamp to the channel's
//! real length, so an over-long request is never an error.
//!
//! - [`SamplingWindow::Span`] is an explicit sample range.
//! - [`SamplingWindow::Duration`] is a span of seconds converted with the
//!   channel's own sampling rate, or the whole remaining channel when no
//!   duration is given.

use crate::error::Result;
use crate::file::Channel;

/// Sampling rate assumed when a caller opts into a fallback (1 MHz).
pub const DEFAULT_FALLBACK_RATE_HZ: f64 = 1_000_000.0;

/// How to obtain a sampling rate for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SampleRatePolicy {
    /// Use the channel's increment; fail if it is missing.
    #[default]
    Strict,
    /// Use the channel's increment, or this rate in Hz if it is missing.
    Fallback(f64),
}

impl SampleRatePolicy {
    /// Builds a policy from an optional fallback rate.
    pub fn from_fallback(fallback_rate_hz: Option<f64>) -> Self {
        fallback_rate_hz.map_or(Self::Strict, Self::Fallback)
    }

    /// Resolves the sampling rate of `channel` in Hz.
    ///
    /// A fallback only covers a *missing* increment. A zero or otherwise
    /// invalid increment is still an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::MissingSamplingRate`](crate::ScopeError::MissingSamplingRate)
    /// under [`SampleRatePolicy::Strict`] when the increment is absent, and
    /// [`ScopeError::InvalidSamplingParameter`](crate::ScopeError::InvalidSamplingParameter)
    /// when the increment or the fallback rate is unusable.
    pub fn resolve(&self, channel: &Channel<'_>) -> Result<f64> {
        if let Some(rate) = channel.sampling_rate()? {
            return Ok(rate);
        }
        match *self {
            Self::Strict => Err(crate::ScopeError::MissingSamplingRate {
                group: channel.group_name().to_string(),
                channel: channel.name().to_string(),
            }),
            Self::Fallback(rate) if rate.is_finite() && rate > 0.0 => {
                tracing::warn!(
                    group = channel.group_name(),
                    channel = channel.name(),
                    rate_hz = rate,
                    "no sampling increment, using fallback rate"
                );
                Ok(rate)
            }
            Self::Fallback(rate) => Err(channel.invalid_parameter(format!(
                "fallback rate must be positive and finite, found {rate}"
            ))),
        }
    }
}

/// A bounded read request against one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingWindow {
    /// Explicit sample range.
    Span {
        /// Index of the first sample.
        start: u64,
        /// Maximum number of samples.
        count: u64,
    },
    /// Time span converted to a count with the channel's sampling rate.
    Duration {
        /// Index of the first sample.
        start: u64,
        /// Seconds to read; `None` reads the whole remaining channel.
        seconds: Option<f64>,
        /// How to obtain the rate when converting seconds to samples.
        rate: SampleRatePolicy,
    },
}

impl SamplingWindow {
    /// An explicit `(start, count)` window.
    pub fn span(start: u64, count: u64) -> Self {
        Self::Span { start, count }
    }

    /// The first `seconds` of the channel at its own sampling rate.
    pub fn duration(seconds: f64) -> Self {
        Self::Duration {
            start: 0,
            seconds: Some(seconds),
            rate: SampleRatePolicy::Strict,
        }
    }

    /// The entire channel. The caller accepts the memory cost.
    pub fn entire() -> Self {
        Self::Duration {
            start: 0,
            seconds: None,
            rate: SampleRatePolicy::Strict,
        }
    }

    /// Builds a duration window from an optional duration, as configured.
    pub fn from_duration(seconds: Option<f64>, rate: SampleRatePolicy) -> Self {
        Self::Duration {
            start: 0,
            seconds,
            rate,
        }
    }

    /// Returns the window with its rate policy replaced by a fallback rate.
    ///
    /// Has no effect on [`SamplingWindow::Span`].
    #[must_use]
    pub fn with_fallback_rate(self, rate_hz: f64) -> Self {
        match self {
            Self::Duration { start, seconds, .. } => Self::Duration {
                start,
                seconds,
                rate: SampleRatePolicy::Fallback(rate_hz),
            },
            span @ Self::Span { .. } => span,
        }
    }

    /// Resolves the window against `channel` to a clamped `(start, count)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is negative or non-finite, or if the
    /// sampling rate cannot be resolved.
    pub fn resolve(&self, channel: &Channel<'_>) -> Result<(u64, u64)> {
        let len = channel.len();
        let (start, requested) = match *self {
            Self::Span { start, count } => (start, count),
            Self::Duration {
                start,
                seconds: None,
                ..
            } => (start, u64::MAX),
            Self::Duration {
                start,
                seconds: Some(seconds),
                rate,
            } => {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(channel.invalid_parameter(format!(
                        "window duration must be non-negative and finite, found {seconds}"
                    )));
                }
                let fs = rate.resolve(channel)?;
                // Non-negative; `as` saturates.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = (seconds * fs).floor() as u64;
                (start, count)
            }
        };
        let remaining = len.saturating_sub(start);
        Ok((start.min(len), requested.min(remaining)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeError;
    use crate::file::{MeasurementFile, WF_INCREMENT};
    use crate::writer::{ChannelData, Segment, TdmsWriter};
    use tempfile::{TempDir, tempdir};

    /// File with `with_rate` (1 kHz, 100 samples) and `no_rate` (100 samples).
    fn fixture() -> (TempDir, MeasurementFile) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("window.tdms");
        let samples: Vec<f64> = (0..100).map(f64::from).collect();
        let segment = Segment::new()
            .channel("G", "with_rate", ChannelData::F64(samples.clone()))
            .channel_property("G", "with_rate", WF_INCREMENT, 0.001)
            .channel("G", "no_rate", ChannelData::F64(samples));
        let mut writer = TdmsWriter::create(&path).unwrap();
        writer.write_segment(&segment).unwrap();
        writer.finish().unwrap();
        let file = MeasurementFile::open(&path).unwrap();
        (dir, file)
    }

    #[test]
    fn test_span_clamps_to_length() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "with_rate").unwrap();
        assert_eq!(SamplingWindow::span(0, 10).resolve(&channel).unwrap(), (0, 10));
        assert_eq!(SamplingWindow::span(95, 10).resolve(&channel).unwrap(), (95, 5));
        assert_eq!(SamplingWindow::span(200, 10).resolve(&channel).unwrap(), (100, 0));
    }

    #[test]
    fn test_duration_uses_channel_rate() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "with_rate").unwrap();
        assert_eq!(SamplingWindow::duration(0.05).resolve(&channel).unwrap(), (0, 50));
        assert_eq!(SamplingWindow::duration(3.0).resolve(&channel).unwrap(), (0, 100));
        assert_eq!(SamplingWindow::duration(0.0).resolve(&channel).unwrap(), (0, 0));
    }

    #[test]
    fn test_entire_needs_no_rate() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "no_rate").unwrap();
        assert_eq!(SamplingWindow::entire().resolve(&channel).unwrap(), (0, 100));
    }

    #[test]
    fn test_missing_rate_requires_opt_in() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "no_rate").unwrap();

        let err = SamplingWindow::duration(1.0).resolve(&channel).unwrap_err();
        assert!(matches!(err, ScopeError::MissingSamplingRate { .. }));

        let window = SamplingWindow::duration(0.00002).with_fallback_rate(DEFAULT_FALLBACK_RATE_HZ);
        assert_eq!(window.resolve(&channel).unwrap(), (0, 20));
    }

    #[test]
    fn test_fallback_does_not_override_channel_rate() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "with_rate").unwrap();
        let policy = SampleRatePolicy::Fallback(DEFAULT_FALLBACK_RATE_HZ);
        assert!((policy.resolve(&channel).unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_durations_and_fallbacks() {
        let (_dir, file) = fixture();
        let channel = file.channel("G", "no_rate").unwrap();

        for seconds in [-1.0, f64::NAN, f64::INFINITY] {
            let err = SamplingWindow::duration(seconds)
                .with_fallback_rate(1.0)
                .resolve(&channel)
                .unwrap_err();
            assert!(matches!(err, ScopeError::InvalidSamplingParameter { .. }));
        }

        let err = SampleRatePolicy::Fallback(0.0).resolve(&channel).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidSamplingParameter { .. }));
    }

    #[test]
    fn test_policy_from_fallback() {
        assert_eq!(SampleRatePolicy::from_fallback(None), SampleRatePolicy::Strict);
        assert_eq!(
            SampleRatePolicy::from_fallback(Some(5.0)),
            SampleRatePolicy::Fallback(5.0)
        );
    }
}
