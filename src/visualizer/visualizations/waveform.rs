//! Time-domain waveform of the latest read window.
//!
//! The window is summed to mono and exposed as a flat amplitude table. The
//! drawing side samples it with [`interpolate`] at fractional positions,
//! blending the two nearest samples, to get a continuous line. Amplitudes are raw sums; scaling into
//! screen space is left to the drawing side.

use crate::audio::WindowSnapshot;

/// Flat amplitude table, fully replaced every frame.
pub struct WaveformExtractor {
    samples: Vec<f32>,
}

impl WaveformExtractor {
    /// Creates an extractor for windows of `read_size` samples.
    pub fn new(read_size: usize) -> Self {
        Self {
            samples: vec![0.0; read_size],
        }
    }

    /// Replaces the table with the channel sum of `window`.
    ///
    /// # Panics
    /// - If the window length differs from the table length
    pub fn extract(&mut self, window: &WindowSnapshot) -> &[f32] {
        assert_eq!(
            window.len(),
            self.samples.len(),
            "waveform table expects {} samples",
            self.samples.len()
        );
        window.downmix_into(&mut self.samples);
        &self.samples
    }
}

/// Linear lookup into `samples` at `x / width` of its span.
pub fn interpolate(samples: &[f32], x: f32, width: f32) -> f32 {
    let Some(last) = samples.len().checked_sub(1) else {
        return 0.0;
    };
    if width <= 0.0 {
        return samples[0];
    }

    let position = (last as f32 * x / width).clamp(0.0, last as f32);
    let left = position.floor() as usize;
    let right = (position.ceil() as usize).min(last);
    let t = position.fract();
    samples[left] + (samples[right] - samples[left]) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_replaces_table_with_sum() {
        let mut window = WindowSnapshot::new(2, 4);
        let mut channels = window.channels_mut();
        channels.next().unwrap().copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        channels.next().unwrap().copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        drop(channels);

        let mut extractor = WaveformExtractor::new(4);
        let samples = extractor.extract(&window).to_vec();
        for (s, expected) in samples.iter().zip([0.2, 0.4, 0.6, 0.8]) {
            assert!((s - expected).abs() < 1e-6);
        }

        let silent = extractor.extract(&WindowSnapshot::new(2, 4));
        assert!(silent.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_amplitude_interpolates_between_samples() {
        let mut window = WindowSnapshot::new(1, 3);
        window
            .channels_mut()
            .next()
            .unwrap()
            .copy_from_slice(&[0.0, 1.0, -1.0]);
        let mut extractor = WaveformExtractor::new(3);
        let samples = extractor.extract(&window);

        assert_eq!(interpolate(samples, 0.0, 100.0), 0.0);
        assert_eq!(interpolate(samples, 25.0, 100.0), 0.5);
        assert_eq!(interpolate(samples, 50.0, 100.0), 1.0);
        assert_eq!(interpolate(samples, 75.0, 100.0), 0.0);
        assert_eq!(interpolate(samples, 100.0, 100.0), -1.0);
        assert_eq!(interpolate(samples, 150.0, 100.0), -1.0);
    }

    #[test]
    fn test_interpolate_empty_table() {
        assert_eq!(interpolate(&[], 1.0, 2.0), 0.0);
        assert_eq!(interpolate(&[0.7], 1.0, 2.0), 0.7);
    }
}
