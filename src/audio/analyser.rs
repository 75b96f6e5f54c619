use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

use super::{AnalyserConfig, FrequencySnapshot};

/// Byte frequency analysis of the most recent `fft_size` samples.
///
/// Mirrors the behaviour of a browser analyser node: Blackman window, forward
/// FFT scaled by `1/N`, exponential smoothing against the previous frame, then
/// a linear map of decibels in `[min_db, max_db]` onto `0..=255`.
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);

        Self {
            config,
            fft,
            window: Self::blackman_window(config.fft_size),
            smoothed: vec![0.0; config.bin_count()],
            scratch: vec![Complex::new(0.0, 0.0); config.fft_size],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let alpha = 0.16;
        let a0 = 0.5 * (1.0 - alpha);
        let a1 = 0.5;
        let a2 = 0.5 * alpha;

        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Analyse the tail of `samples`. Shorter input is treated as preceded by silence.
    pub fn analyse(&mut self, samples: &[f32]) -> FrequencySnapshot {
        let size = self.config.fft_size;
        let take = samples.len().min(size);
        let offset = size - take;
        let tail = &samples[samples.len() - take..];

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < offset { 0.0 } else { tail[i - offset] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let smoothing = self.config.smoothing;
        let scale = 1.0 / size as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * scale;
            let value = smoothing * *smoothed + (1.0 - smoothing) * magnitude;
            // Keep NaN/inf out of the smoothing memory
            *smoothed = if value.is_finite() { value } else { 0.0 };
        }

        let range_scale = 255.0 / (self.config.max_db - self.config.min_db);
        let bins = self
            .smoothed
            .iter()
            .map(|&magnitude| {
                if magnitude <= 0.0 {
                    return 0;
                }
                let db = 20.0 * magnitude.log10();
                ((db - self.config.min_db) * range_scale).clamp(0.0, 255.0) as u8
            })
            .collect();

        FrequencySnapshot::new(bins)
    }

    /// Forget the smoothing memory, as a freshly built node would.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|n| amplitude * (2.0 * std::f32::consts::PI * bin as f32 * n as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default());
        let snapshot = analyser.analyse(&[0.0; 64]);
        assert_eq!(snapshot.len(), 32);
        assert!(snapshot.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default());
        let snapshot = analyser.analyse(&[]);
        assert_eq!(snapshot, FrequencySnapshot::silent(32));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default());
        let snapshot = analyser.analyse(&sine(8, 64, 1.0));

        let (peak, &value) = snapshot
            .bins()
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .unwrap();

        assert_eq!(peak, 8);
        assert!(value > 200, "peak byte was {}", value);
        assert_eq!(snapshot.bins()[0], 0);
    }

    #[test]
    fn test_smoothing_decays_after_signal_stops() {
        let mut analyser = SpectrumAnalyser::new(AnalyserConfig::default());
        let loud = analyser.analyse(&sine(8, 64, 1.0)).bins()[8];
        let after = analyser.analyse(&[0.0; 64]).bins()[8];

        // Smoothing keeps 40% of the previous magnitude, about -8 dB
        assert!(after > 0);
        assert!(after < loud);

        analyser.reset();
        assert_eq!(analyser.analyse(&[0.0; 64]).bins()[8], 0);
    }
}
