//! Scrolling frequency-magnitude height-field.
//!
//! Each frame the read window is summed to mono, zero-padded to the FFT size
//! and transformed. Magnitudes are sampled along a skewed column axis that
//! spends most columns on low frequencies, scaled against the loudest bin of
//! the frame, and written as the newest row of a depth history. Older rows
//! move back one step per frame and the oldest row falls off.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::audio::WindowSnapshot;

/// Construction-time parameters of a spectral extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSettings {
    /// FFT length is `2^fft_order`
    pub fft_order: u32,
    /// Columns per history row
    pub x_res: usize,
    /// Rows of history (depth)
    pub z_res: usize,
    /// Height of the loudest bin in world units
    pub y_height: f32,
    /// Exponent of the column skew curve (smaller = more low-frequency columns)
    pub skew_exponent: f32,
}

/// Stateful spectrum-to-height-field converter with its own FFT workspace.
pub struct SpectralExtractor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Complex work buffer, `fft_size` long
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    downmix: Vec<f32>,
    /// `fft_size / 2 + 1` magnitudes, DC through Nyquist
    magnitudes: Vec<f32>,
    /// Magnitude bin sampled by each column
    column_bins: Vec<usize>,
    /// `x_res * z_res` heights, row 0 newest
    history: Vec<f32>,
    x_res: usize,
    y_height: f32,
}

impl SpectralExtractor {
    /// Plans the FFT and allocates every buffer used per frame.
    ///
    /// The history starts out flat.
    ///
    /// # Panics
    /// - If `x_res < 2`, `z_res == 0` or `fft_order == 0`
    pub fn new(settings: &SpectralSettings) -> Self {
        assert!(settings.x_res >= 2, "spectral row needs at least two columns");
        assert!(settings.z_res >= 1, "spectral history needs at least one row");
        assert!(settings.fft_order >= 1, "fft order must be at least one");

        let fft_size = 1usize << settings.fft_order;
        let half = fft_size / 2;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let column_bins = (0..settings.x_res)
            .map(|col| skewed_bin(col, settings.x_res, settings.skew_exponent, half))
            .collect();

        tracing::debug!(
            "Spectral extractor: fft size {}, {}x{} history, skew {}",
            fft_size,
            settings.x_res,
            settings.z_res,
            settings.skew_exponent
        );

        Self {
            fft,
            fft_size,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            downmix: vec![0.0; fft_size],
            magnitudes: vec![0.0; half + 1],
            column_bins,
            history: vec![0.0; settings.x_res * settings.z_res],
            x_res: settings.x_res,
            y_height: settings.y_height,
        }
    }

    /// Transforms one read window and pushes the resulting row into the history.
    ///
    /// Returns the full `x_res * z_res` history, newest row first.
    ///
    /// # Panics
    /// - If the window is longer than the FFT size
    pub fn extract(&mut self, window: &WindowSnapshot) -> &[f32] {
        let len = window.len();
        assert!(
            len <= self.fft_size,
            "read window of {len} samples exceeds fft size {}",
            self.fft_size
        );

        window.downmix_into(&mut self.downmix);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < len { self.downmix[i] } else { 0.0 };
            *slot = Complex::new(sample, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *magnitude = bin.norm();
        }

        self.push_row();
        &self.history
    }

    /// Pushes a row computed from precomputed magnitudes.
    ///
    /// `magnitudes` must cover bins `0..=fft_size / 2`.
    pub fn apply_magnitudes(&mut self, magnitudes: &[f32]) -> &[f32] {
        let bins = self.magnitudes.len();
        assert!(
            magnitudes.len() >= bins,
            "expected {bins} magnitude bins, got {}",
            magnitudes.len()
        );
        self.magnitudes.copy_from_slice(&magnitudes[..bins]);
        self.push_row();
        &self.history
    }

    fn push_row(&mut self) {
        let half = self.fft_size / 2;
        // A single inf/NaN input sample poisons every bin; treat it as silence.
        for magnitude in &mut self.magnitudes {
            if !magnitude.is_finite() {
                *magnitude = 0.0;
            }
        }
        let (min, max) = self.magnitudes[..half]
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &m| {
                (lo.min(m), hi.max(m))
            });

        let len = self.history.len();
        self.history.copy_within(0..len - self.x_res, self.x_res);

        for (height, &bin) in self.history[..self.x_res]
            .iter_mut()
            .zip(&self.column_bins)
        {
            let scaled = self.magnitudes[bin] / max * self.y_height;
            *height = if max > 0.0 && scaled.is_finite() {
                scaled.clamp(0.0, self.y_height)
            } else {
                0.0
            };
        }

        tracing::trace!("Spectral frame range {:.4}..{:.4}", min, max);
    }

    /// Full height history, row 0 newest.
    pub fn history(&self) -> &[f32] {
        &self.history
    }

    /// Heights synthesized by the most recent frame.
    pub fn newest_row(&self) -> &[f32] {
        &self.history[..self.x_res]
    }

    /// Magnitudes of the most recent frame, DC through Nyquist.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

}

/// Magnitude bin sampled by column `col` of an `x_res`-wide row.
///
/// Column 0 samples the top bin (`half`) and the last column samples DC; the
/// curve `1 - t^skew` flattens towards the last columns so low frequencies get
/// most of the row.
pub fn skewed_bin(col: usize, x_res: usize, skew_exponent: f32, half: usize) -> usize {
    let proportion = col as f32 / (x_res as f32 - 1.0);
    let skewed = 1.0 - (proportion.ln() * skew_exponent).exp();
    // Float-to-int casts saturate, so negatives land on 0.
    ((skewed * half as f32) as usize).min(half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn settings(fft_order: u32, x_res: usize, z_res: usize) -> SpectralSettings {
        SpectralSettings {
            fft_order,
            x_res,
            z_res,
            y_height: 1.0,
            skew_exponent: 0.2,
        }
    }

    fn mono_window(samples: &[f32]) -> WindowSnapshot {
        let mut window = WindowSnapshot::new(1, samples.len());
        window.channels_mut().next().unwrap().copy_from_slice(samples);
        window
    }

    #[test]
    fn test_skewed_bin_endpoints() {
        assert_eq!(skewed_bin(0, 80, 0.2, 512), 512);
        assert_eq!(skewed_bin(79, 80, 0.2, 512), 0);
        assert!(skewed_bin(40, 80, 0.2, 512) < 512 / 4);
    }

    #[test]
    fn test_silence_produces_flat_row() {
        let mut extractor = SpectralExtractor::new(&settings(10, 80, 4));
        let window = WindowSnapshot::new(2, 256);
        let history = extractor.extract(&window);

        assert_eq!(history.len(), 80 * 4);
        assert!(history.iter().all(|h| *h == 0.0));
    }

    #[test]
    fn test_increasing_magnitudes_give_monotone_row() {
        let mut extractor = SpectralExtractor::new(&settings(10, 80, 2));
        let magnitudes: Vec<f32> = (0..=512).map(|k| k as f32).collect();
        extractor.apply_magnitudes(&magnitudes);

        let row = extractor.newest_row();
        // Walking from the DC column (last) towards column 0 climbs the bins.
        for pair in row.windows(2) {
            assert!(pair[0] >= pair[1], "row not monotone: {row:?}");
        }
        assert_eq!(row[0], 1.0);
        assert_eq!(row[79], 0.0);
        assert!(row.iter().all(|h| (0.0..=1.0).contains(h)));
    }

    #[test]
    fn test_history_rows_shift_back() {
        let x_res = 5;
        let z_res = 4;
        let mut extractor = SpectralExtractor::new(&settings(4, x_res, z_res));

        let mut synthesized = Vec::new();
        for r in 0..z_res {
            let magnitudes: Vec<f32> = (0..=8).map(|b| 1.0 + (r * b) as f32).collect();
            extractor.apply_magnitudes(&magnitudes);
            synthesized.push(extractor.newest_row().to_vec());
        }

        for pair in synthesized.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }

        let history = extractor.history();
        for i in 0..z_res {
            assert_eq!(
                &history[i * x_res..(i + 1) * x_res],
                &synthesized[z_res - 1 - i][..],
                "history row {i}"
            );
        }
    }

    #[test]
    fn test_oldest_row_is_discarded() {
        let mut extractor = SpectralExtractor::new(&settings(4, 3, 2));
        let loud: Vec<f32> = (0..=8).map(|b| b as f32 + 1.0).collect();
        let silent = vec![0.0; 9];

        extractor.apply_magnitudes(&loud);
        extractor.apply_magnitudes(&silent);
        extractor.apply_magnitudes(&silent);
        assert!(extractor.history().iter().all(|h| *h == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut extractor = SpectralExtractor::new(&settings(10, 80, 2));
        let samples: Vec<f32> = (0..256)
            .map(|n| (2.0 * PI * 64.0 * n as f32 / 1024.0).sin())
            .collect();
        extractor.extract(&mono_window(&samples));

        let magnitudes = &extractor.magnitudes()[..512];
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);
        assert!(extractor.newest_row().iter().all(|h| (0.0..=1.0).contains(h)));
    }

    #[test]
    fn test_channels_are_summed_before_transform() {
        let samples: Vec<f32> = (0..128).map(|n| (n as f32 * 0.3).sin()).collect();

        let mut mono = SpectralExtractor::new(&settings(8, 10, 1));
        mono.extract(&mono_window(&samples));

        let mut stereo_window = WindowSnapshot::new(2, samples.len());
        for channel in stereo_window.channels_mut() {
            channel.copy_from_slice(&samples);
        }
        let mut stereo = SpectralExtractor::new(&settings(8, 10, 1));
        stereo.extract(&stereo_window);

        for (m, s) in mono.magnitudes().iter().zip(stereo.magnitudes()) {
            assert!((2.0 * m - s).abs() < 1e-3);
        }
    }

    #[test]
    fn test_heights_follow_frame_maximum() {
        let samples: Vec<f32> = (0..256).map(|n| (n as f32 * 0.05).sin()).collect();
        let louder: Vec<f32> = samples.iter().map(|s| s * 10.0).collect();

        let mut quiet = SpectralExtractor::new(&settings(10, 40, 1));
        let mut loud = SpectralExtractor::new(&settings(10, 40, 1));
        quiet.extract(&mono_window(&samples));
        loud.extract(&mono_window(&louder));

        for (q, l) in quiet.newest_row().iter().zip(loud.newest_row()) {
            assert!((q - l).abs() < 1e-4);
        }
    }

    #[test]
    fn test_non_finite_samples_stay_in_range() {
        let mut extractor = SpectralExtractor::new(&settings(10, 80, 2));
        let mut samples: Vec<f32> = (0..256).map(|n| (n as f32 * 0.2).sin()).collect();
        samples[17] = f32::INFINITY;
        let history = extractor.extract(&mono_window(&samples));
        assert!(history.iter().all(|h| (0.0..=1.0).contains(h)), "{history:?}");

        samples[17] = f32::NAN;
        let history = extractor.extract(&mono_window(&samples));
        assert!(history.iter().all(|h| (0.0..=1.0).contains(h)), "{history:?}");
    }

    #[test]
    fn test_non_finite_bin_is_ignored() {
        let mut extractor = SpectralExtractor::new(&settings(4, 5, 1));
        let mut magnitudes: Vec<f32> = (0..=8).map(|b| b as f32).collect();
        magnitudes[8] = f32::INFINITY;
        magnitudes[3] = f32::NAN;
        let row = extractor.apply_magnitudes(&magnitudes);

        assert!(row.iter().all(|h| (0.0..=1.0).contains(h)), "{row:?}");
        assert!(row.iter().any(|h| *h > 0.0));
    }

    #[test]
    #[should_panic(expected = "exceeds fft size")]
    fn test_window_larger_than_fft_panics() {
        let mut extractor = SpectralExtractor::new(&settings(4, 4, 1));
        extractor.extract(&WindowSnapshot::new(1, 32));
    }
}
