//! PCM → analyser frames with the same byte semantics as a browser
//! AnalyserNode, so the signal-shape thresholds keep their meaning:
//! - time domain: `128 * (x + 1)` clamped to 0-255
//! - frequency: Blackman window, FFT magnitude / N, exponential smoothing,
//!   dB mapped linearly from [min_decibels, max_decibels] onto 0-255

use std::sync::Arc;
use std::time::Instant;

use rustfft::{num_complex::Complex32, Fft, FftPlanner};

use crate::config::AnalyserConfig;
use crate::source::AudioFrame;

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex32>,
    config: AnalyserConfig,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let n = config.fft_size;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        Self {
            fft,
            window: blackman(n),
            smoothed: vec![0.0; n / 2],
            scratch: vec![Complex32::new(0.0, 0.0); n],
            config,
        }
    }

    /// Analyse the most recent `fft_size` samples (shorter input is
    /// zero-padded at the front, longer input uses its tail).
    pub fn analyse(&mut self, samples: &[f32], captured_at: Instant) -> AudioFrame {
        let n = self.config.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        let mut time_domain = vec![128u8; n];
        for (slot, &x) in time_domain[pad..].iter_mut().zip(tail) {
            *slot = (128.0 * (x + 1.0)).clamp(0.0, 255.0) as u8;
        }

        for (i, c) in self.scratch.iter_mut().enumerate() {
            let x = if i < pad { 0.0 } else { tail[i - pad] };
            *c = Complex32::new(x * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.config.smoothing;
        let range = self.config.max_decibels - self.config.min_decibels;
        let mut frequency = Vec::with_capacity(n / 2);
        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / n as f32;
            *prev = tau * *prev + (1.0 - tau) * magnitude;
            let byte = if *prev > 0.0 {
                let db = 20.0 * prev.log10();
                (255.0 / range * (db - self.config.min_decibels)).clamp(0.0, 255.0) as u8
            } else {
                0
            };
            frequency.push(byte);
        }

        AudioFrame {
            frequency,
            time_domain,
            captured_at,
        }
    }

    /// Same as `analyse` for 16-bit PCM.
    pub fn analyse_pcm(&mut self, pcm: &[i16], captured_at: Instant) -> AudioFrame {
        let samples: Vec<f32> = pcm.iter().map(|&s| f32::from(s) / 32768.0).collect();
        self.analyse(&samples, captured_at)
    }
}

fn blackman(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let tau = 2.0 * std::f32::consts::PI;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (tau * x).cos() + A2 * (2.0 * tau * x).cos()
        })
        .collect()
}
