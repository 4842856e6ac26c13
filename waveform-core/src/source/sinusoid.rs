//! Precomputed sinusoidal source series.
//!
//! ## Algorithm
//!
//! 1. Time vector `t[i] = i / sample_rate` over `duration_seconds`.
//! 2. Sum a signal sine and a slow baseline sine, both at the 16-bit
//!    amplitude ceiling `A = floor((2^16 - 1) / 2)`.
//! 3. Add uniform noise scaled to `floor((2^noise_resolution - 1) / 2)`.
//! 4. Rescale the raw series from its empirical `[min, max]` into
//!    `[-M, M - 1]` with `M = A - 1`, then floor to integers.
//!
//! The series is built once and served in `chunk_length` pieces. A read that
//! would run past the end restarts the cursor at zero, dropping the unread
//! tail.

use std::f64::consts::PI;

use tracing::{debug, info};

use super::{noise::NoiseSource, SampleSource};
use crate::buffering::{Sample, SampleChunk};
use crate::error::{Result, WaveformError};

/// Bit depth of the generated signal.
pub const SIGNAL_RESOLUTION_BITS: u32 = 16;

/// Shape of the generated series.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Length of the precomputed series in seconds. Default: 60.
    pub duration_seconds: u32,
    /// Signal sine frequency in Hz. Default: 3.
    pub signal_frequency: f32,
    /// Baseline sine frequency in Hz. Default: 0.1.
    pub baseline_frequency: f32,
    /// Noise amplitude in bits. Default: 12.
    pub noise_resolution: u32,
    /// Samples per second. Default: 75.
    pub sample_rate: u32,
    /// Samples returned per read. Default: 25.
    pub chunk_length: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 60,
            signal_frequency: 3.0,
            baseline_frequency: 0.1,
            noise_resolution: 12,
            sample_rate: 75,
            chunk_length: 25,
        }
    }
}

/// Signal + baseline + noise series, quantized to 16 bits.
pub struct SinusoidalSource {
    config: SourceConfig,
    noise: Box<dyn NoiseSource>,
    samples: Vec<Sample>,
    read_cursor: usize,
    /// Empirical `(min, max)` of the raw series, fixed at build time.
    raw_range: Option<(f64, f64)>,
}

impl SinusoidalSource {
    pub fn new(config: SourceConfig, noise: impl NoiseSource) -> Self {
        Self {
            config,
            noise: Box::new(noise),
            samples: Vec::new(),
            read_cursor: 0,
            raw_range: None,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn total_samples(&self) -> usize {
        self.config.duration_seconds as usize * self.config.sample_rate as usize
    }

    pub fn is_built(&self) -> bool {
        self.raw_range.is_some()
    }

    /// Built series; empty before [`build`](SampleSource::build).
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn raw_range(&self) -> Option<(f64, f64)> {
        self.raw_range
    }

    fn raw_series(&mut self) -> Vec<f64> {
        let amplitude = half_range(SIGNAL_RESOLUTION_BITS);
        let noise_amplitude = half_range(self.config.noise_resolution);
        let t = time_vector(self.total_samples(), self.config.sample_rate);

        let signal = sine_wave(&t, f64::from(self.config.signal_frequency), amplitude);
        let baseline = sine_wave(&t, f64::from(self.config.baseline_frequency), amplitude);

        signal
            .iter()
            .zip(&baseline)
            .map(|(s, b)| s + b + noise_amplitude * self.noise.next_unit())
            .collect()
    }
}

impl SampleSource for SinusoidalSource {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn chunk_length(&self) -> usize {
        self.config.chunk_length
    }

    /// Compute the full series. A second call on a built source is a no-op.
    ///
    /// # Errors
    /// - `InvalidConfig` if the series is shorter than one chunk.
    /// - `DegenerateSignal` if any raw sample is not finite, or the raw
    ///   series is flat and the rescale would divide by zero.
    fn build(&mut self) -> Result<()> {
        if self.is_built() {
            return Ok(());
        }

        let total = self.total_samples();
        if self.config.chunk_length == 0 || total < self.config.chunk_length {
            return Err(WaveformError::InvalidConfig(format!(
                "series of {total} samples cannot serve chunks of {}",
                self.config.chunk_length
            )));
        }

        let raw = self.raw_series();
        if let Some(&bad) = raw.iter().find(|v| !v.is_finite()) {
            return Err(WaveformError::DegenerateSignal { value: bad });
        }
        let (lo, hi) = raw
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if hi <= lo {
            return Err(WaveformError::DegenerateSignal { value: lo });
        }

        let ceiling = half_range(SIGNAL_RESOLUTION_BITS) - 1.0;
        let (out_lo, out_hi) = (-ceiling, ceiling - 1.0);

        self.samples = raw
            .iter()
            .map(|&v| change_range(v, lo, hi, out_lo, out_hi).floor() as Sample)
            .collect();
        self.raw_range = Some((lo, hi));
        self.read_cursor = 0;

        info!(
            samples = total,
            raw_min = lo,
            raw_max = hi,
            "source series built"
        );
        Ok(())
    }

    /// Return the next `chunk_length` samples.
    ///
    /// # Errors
    /// `NotInitialized` before `build()`.
    fn read_chunk(&mut self) -> Result<SampleChunk> {
        if !self.is_built() {
            return Err(WaveformError::NotInitialized("source series"));
        }

        let len = self.config.chunk_length;
        if self.read_cursor + len > self.samples.len() {
            debug!(
                read_cursor = self.read_cursor,
                dropped = self.samples.len() - self.read_cursor,
                "series exhausted, restarting at zero"
            );
            self.read_cursor = 0;
        }

        let start = self.read_cursor;
        let chunk = SampleChunk::new(start, self.samples[start..start + len].to_vec());
        self.read_cursor += len;
        Ok(chunk)
    }
}

/// Half the span of an unsigned `bits`-bit range: `floor((2^bits - 1) / 2)`.
pub fn half_range(bits: u32) -> f64 {
    ((2f64.powi(bits as i32) - 1.0) / 2.0).floor()
}

/// `t[i] = i / sample_rate` for `i` in `0..len`.
pub fn time_vector(len: usize, sample_rate: u32) -> Vec<f64> {
    let fs = f64::from(sample_rate);
    (0..len).map(|i| i as f64 / fs).collect()
}

pub fn sine_wave(t: &[f64], frequency: f64, amplitude: f64) -> Vec<f64> {
    t.iter()
        .map(|&ti| amplitude * (2.0 * PI * frequency * ti).sin())
        .collect()
}

/// Affine map of `x` from `[a, b]` onto `[c, d]`.
///
/// Normalizing first keeps the endpoints exact: `a` lands on `c` and `b`
/// lands on `d` with no rounding drift.
pub fn change_range(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    let unit = (x - a) / (b - a);
    unit * (d - c) + c
}
