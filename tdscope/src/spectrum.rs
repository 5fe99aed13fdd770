//! Frequency-domain transform of a windowed signal.
//!
//! The DC offset is removed, a full-length DFT is taken with no padding or
//! window function, and the non-negative bins `[0, N/2)` are kept with
//! magnitude `2/N * |X[k]|`. With that normalization a pure on-bin tone of
//! amplitude `A` reads back as `A`.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use serde::Serialize;

/// Single-sided magnitude spectrum.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Spectrum {
    /// Sampling rate the frequency axis was built with.
    pub sample_rate_hz: f64,
    /// Bin centre frequencies, `k * Fs / N`.
    pub frequencies_hz: Vec<f64>,
    /// Normalized magnitudes, one per frequency.
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    /// Computes the spectrum of `samples` taken at `sample_rate_hz`.
    ///
    /// Fewer than two samples produce an empty spectrum.
    #[allow(clippy::cast_precision_loss)] // Window lengths are far below 2^52
    pub fn compute(samples: &[f64], sample_rate_hz: f64) -> Self {
        let n = samples.len();
        let half = n / 2;
        if half == 0 {
            return Self {
                sample_rate_hz,
                frequencies_hz: Vec::new(),
                magnitudes: Vec::new(),
            };
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex64> = samples
            .iter()
            .map(|&v| Complex64::new(v - mean, 0.0))
            .collect();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let scale = 2.0 / n as f64;
        let bin_width = sample_rate_hz / n as f64;
        let frequencies_hz = (0..half).map(|k| k as f64 * bin_width).collect();
        let magnitudes = buffer[..half].iter().map(|c| scale * c.norm()).collect();

        Self {
            sample_rate_hz,
            frequencies_hz,
            magnitudes,
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// Returns `true` if the spectrum has no bins.
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Returns the `(frequency, magnitude)` of the strongest bin.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, &magnitude)| (self.frequencies_hz[k], magnitude))
    }
}

/// Evenly spaced time stamps for `n` samples, from 0 to `n / Fs` inclusive.
///
/// This is the axis the time-domain plot is drawn against. Its spacing is
/// `(n / Fs) / (n - 1)`, marginally wider than `1 / Fs`.
#[allow(clippy::cast_precision_loss)] // Window lengths are far below 2^52
pub fn time_axis(n: usize, sample_rate_hz: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let stop = n as f64 / sample_rate_hz;
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { stop * i as f64 / last })
                .collect()
        }
    }
}
