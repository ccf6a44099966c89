//! Per-frame copy of the most recent samples of every channel.

/// Contiguous per-channel read window, allocated once and refilled every frame.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    channels: Vec<Vec<f32>>,
    len: usize,
}

impl WindowSnapshot {
    /// Creates a zeroed window of `len` samples for `num_channels` channels.
    pub fn new(num_channels: usize, len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; len]; num_channels],
            len,
        }
    }

    /// Samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Sums all channels sample-wise into `out[..len]`.
    ///
    /// The sum is not divided by the channel count.
    ///
    /// # Panics
    /// - If `out` is shorter than the window
    pub fn downmix_into(&self, out: &mut [f32]) {
        let out = &mut out[..self.len];
        out.fill(0.0);
        for channel in &self.channels {
            for (acc, &sample) in out.iter_mut().zip(channel) {
                *acc += sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_sums_without_averaging() {
        let mut window = WindowSnapshot::new(2, 3);
        let mut channels = window.channels_mut();
        channels.next().unwrap().copy_from_slice(&[0.25, 0.5, -1.0]);
        channels.next().unwrap().copy_from_slice(&[0.25, 0.5, 0.5]);
        drop(channels);

        let mut out = [9.0; 4];
        window.downmix_into(&mut out);
        assert_eq!(out, [0.5, 1.0, -0.5, 9.0]);
    }
}
