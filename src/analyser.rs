use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_FFT_SIZE: usize = 1024;
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

/// Byte frequency analyser in the style of a browser `AnalyserNode`.
///
/// Keeps the last `fft_size` mono samples. Each call to
/// [`ByteFrequencyAnalyser::byte_frequency_data`] windows them (Blackman),
/// runs a real FFT, smooths the magnitudes over time and maps them from
/// `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`.
pub struct ByteFrequencyAnalyser {
    fft_size: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    history: VecDeque<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl ByteFrequencyAnalyser {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input = r2c.make_input_vec();
        let spectrum = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        let bins = fft_size / 2;
        Self {
            fft_size,
            window: blackman_window(fft_size),
            history: VecDeque::from(vec![0.0; fft_size]),
            input,
            spectrum,
            scratch,
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
            r2c,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends mono samples, discarding the oldest beyond `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for &s in &samples[skip..] {
            if self.history.len() == self.fft_size {
                self.history.pop_front();
            }
            self.history.push_back(s);
        }
    }

    /// Computes a fresh snapshot of `fft_size / 2` byte magnitudes.
    pub fn byte_frequency_data(&mut self) -> &[u8] {
        for ((dst, &s), &w) in self.input.iter_mut().zip(&self.history).zip(&self.window) {
            *dst = s * w;
        }

        if let Err(e) = self
            .r2c
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            log::warn!("FFT failed, keeping previous snapshot: {}", e);
            return &self.bytes;
        }

        let scale = 1.0 / self.fft_size as f32;
        let tau = SMOOTHING_TIME_CONSTANT;
        let range = MAX_DECIBELS - MIN_DECIBELS;

        for (bin, c) in self.spectrum.iter().take(self.bin_count()).enumerate() {
            let magnitude = c.norm() * scale;
            let smooth = tau * self.smoothed[bin] + (1.0 - tau) * magnitude;
            self.smoothed[bin] = if smooth.is_finite() { smooth } else { 0.0 };

            let db = if self.smoothed[bin] > 0.0 {
                20.0 * self.smoothed[bin].log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - MIN_DECIBELS) / range;
            self.bytes[bin] = scaled.floor().clamp(0.0, 255.0) as u8;
        }

        &self.bytes
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.42f32;
    let a1 = 0.5f32;
    let a2 = 0.08f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
