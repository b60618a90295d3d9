//! Frequency analyser shared by the audio graph and the visualizer
//!
//! The platform context pushes the mixed output of both slots into the
//! analyser as mono `f32` samples. Readers pull a byte-scaled magnitude
//! spectrum, one value per frequency bin, the same shape a browser
//! `AnalyserNode` hands out:
//!
//! 1. the newest `fft_size` samples are Blackman-windowed
//! 2. a forward FFT gives per-bin magnitudes, normalised by `fft_size`
//! 3. magnitudes are smoothed against the previous read with the time constant
//! 4. the smoothed value is converted to dB and mapped from `[min_db, max_db]`
//!    onto `0..=255`

use crate::types::AnalyserSettings;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

/// Read handle to the analyser, shared between the graph and its observers
pub type SharedAnalyser = Arc<Mutex<Analyser>>;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Frequency-domain analyser
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,

    /// Time-domain ring buffer, `write_pos` is the oldest sample
    ring: Vec<f32>,
    write_pos: usize,

    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .finish_non_exhaustive()
    }
}

impl Analyser {
    /// Create an analyser
    ///
    /// `fft_size` is rounded up to a power of two and clamped to `32..=32768`.
    /// A smoothing constant outside `[0, 1)` is clamped into range.
    pub fn new(settings: &AnalyserSettings) -> Self {
        let fft_size = settings
            .fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();

        let (min_db, max_db) = if settings.min_db < settings.max_db {
            (settings.min_db, settings.max_db)
        } else {
            (-100.0, -30.0)
        };

        let window = (0..fft_size)
            .map(|i| {
                // Blackman, alpha = 0.16
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft_size,
            smoothing: settings.smoothing.clamp(0.0, 0.99),
            min_db,
            max_db,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window,
            smoothed: vec![0.0; fft_size / 2],
            fft,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Wrap in a shared handle
    pub fn shared(settings: &AnalyserSettings) -> SharedAnalyser {
        Arc::new(Mutex::new(Self::new(settings)))
    }

    /// FFT window size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins (`fft_size / 2`)
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Smoothing time constant in use
    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Append mono samples to the analysis window
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.ring[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Fill `out` with the current byte-scaled magnitude spectrum
    ///
    /// Writes `min(out.len(), frequency_bin_count())` values and returns that
    /// count. Each call advances the smoothing state.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) -> usize {
        self.analyse();

        let range = self.max_db - self.min_db;
        let count = out.len().min(self.smoothed.len());
        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed).take(count) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 / range * (db - self.min_db);
            *byte = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }
        count
    }

    /// Drop buffered audio and smoothing history
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
    }

    fn analyse(&mut self) {
        // Unroll the ring oldest-first into the FFT buffer
        for i in 0..self.fft_size {
            let sample = self.ring[(self.write_pos + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (bin, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[bin].norm() * norm;
            *value = tau * *value + (1.0 - tau) * magnitude;
        }
    }
}
