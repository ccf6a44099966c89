//! Per-frame orchestration of the visualization pipeline.
//!
//! Every tick the driver reads one fixed-size window from the ring buffer,
//! runs the extractor of the active mode and lends the result to the
//! rendering surface. Only one extractor runs per frame.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::visualizations::{
    MeshExtents, MeshLayout, MeshTopology, SpectralExtractor, SpectralSettings, WaveformExtractor,
};
use crate::audio::{RingBuffer, WindowSnapshot};

/// Visualization mode selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VisualizationMode {
    /// Scrolling spectral height-field drawn on a mesh topology
    Spectral(MeshTopology),
    /// Time-domain amplitude line
    Waveform,
}

impl Default for VisualizationMode {
    fn default() -> Self {
        Self::Spectral(MeshTopology::default())
    }
}

impl VisualizationMode {
    /// Every mode in cycling order.
    pub const ALL: [VisualizationMode; 5] = [
        VisualizationMode::Spectral(MeshTopology::Grid),
        VisualizationMode::Spectral(MeshTopology::Line),
        VisualizationMode::Spectral(MeshTopology::Circle),
        VisualizationMode::Spectral(MeshTopology::Triangle),
        VisualizationMode::Waveform,
    ];

    /// The mode after this one in [`VisualizationMode::ALL`], wrapping around.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spectral(topology) => write!(f, "{topology}"),
            Self::Waveform => write!(f, "waveform"),
        }
    }
}

impl std::str::FromStr for VisualizationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown visualization mode '{s}'. Expected one of: grid, line, circle, triangle, waveform"
                )
            })
    }
}

impl TryFrom<String> for VisualizationMode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VisualizationMode> for String {
    fn from(mode: VisualizationMode) -> Self {
        mode.to_string()
    }
}

/// Whether the frame tick produces payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// Everything the driver needs at construction; fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSettings {
    /// Samples read from the ring buffer per frame
    pub read_size: usize,
    pub fft_order: u32,
    pub x_res: usize,
    pub z_res: usize,
    pub extents: MeshExtents,
    pub skew_exponent: f32,
}

/// Payload handed to the rendering surface for one frame.
#[derive(Debug, Clone, Copy)]
pub enum FramePayload<'a> {
    /// Height history (`x_res * z_res`, row 0 newest) in `[0, y_height]`
    Heights {
        heights: &'a [f32],
        layout: &'a MeshLayout,
    },
    /// Raw summed amplitudes, `read_size` long
    Amplitudes(&'a [f32]),
}

/// Spectral extractor paired with the mesh it is drawn on.
struct SpectralView {
    extractor: SpectralExtractor,
    layout: MeshLayout,
}

/// Drives one extractor per frame from a shared ring buffer.
pub struct VisualizationDriver {
    ring: Arc<RingBuffer>,
    settings: DriverSettings,
    window: WindowSnapshot,
    waveform: WaveformExtractor,
    /// Built on first use, indexed by [`MeshTopology::index`]
    spectral: [Option<SpectralView>; 4],
    mode: VisualizationMode,
    state: DriverState,
    frame_count: u64,
}

impl VisualizationDriver {
    /// Creates a stopped driver reading from `ring`.
    ///
    /// # Panics
    /// - If `read_size` is not smaller than the ring capacity
    /// - If `read_size` exceeds the FFT size
    pub fn new(ring: Arc<RingBuffer>, settings: DriverSettings, mode: VisualizationMode) -> Self {
        assert!(
            settings.read_size < ring.capacity(),
            "read size {} must be smaller than ring capacity {}",
            settings.read_size,
            ring.capacity()
        );
        assert!(
            settings.read_size <= 1usize << settings.fft_order,
            "read size {} exceeds fft size {}",
            settings.read_size,
            1usize << settings.fft_order
        );

        let window = WindowSnapshot::new(ring.channels(), settings.read_size);
        let mut driver = Self {
            ring,
            settings,
            window,
            waveform: WaveformExtractor::new(settings.read_size),
            spectral: [None, None, None, None],
            mode,
            state: DriverState::Stopped,
            frame_count: 0,
        };
        driver.set_mode(mode);
        driver
    }

    pub fn start(&mut self) {
        if self.state != DriverState::Running {
            self.state = DriverState::Running;
            tracing::info!("Visualization started ({})", self.mode);
        }
    }

    pub fn stop(&mut self) {
        if self.state != DriverState::Stopped {
            self.state = DriverState::Stopped;
            tracing::info!("Visualization stopped after {} frames", self.frame_count);
        }
    }

    /// Flips between `Running` and `Stopped`.
    pub fn toggle(&mut self) {
        match self.state {
            DriverState::Running => self.stop(),
            DriverState::Stopped => self.start(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    /// Switches the active extractor.
    ///
    /// A spectral topology seen before keeps its warmed-up history; a new one
    /// starts flat.
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if let VisualizationMode::Spectral(topology) = mode {
            let settings = self.settings;
            self.spectral[topology.index()].get_or_insert_with(|| {
                let extractor = SpectralExtractor::new(&SpectralSettings {
                    fft_order: settings.fft_order,
                    x_res: settings.x_res,
                    z_res: settings.z_res,
                    y_height: settings.extents.y_height,
                    skew_exponent: settings.skew_exponent,
                });
                tracing::debug!(
                    "Spectral extractor for {}: {}-point FFT",
                    topology,
                    extractor.fft_size()
                );
                SpectralView {
                    extractor,
                    layout: MeshLayout::new(
                        topology,
                        settings.x_res,
                        settings.z_res,
                        settings.extents,
                    ),
                }
            });
        }

        if mode != self.mode {
            tracing::debug!("Visualization mode: {} -> {}", self.mode, mode);
        }
        self.mode = mode;
    }

    /// Frames produced since construction.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Produces the next payload, or `None` while stopped.
    pub fn tick(&mut self) -> Option<FramePayload<'_>> {
        if self.state == DriverState::Stopped {
            return None;
        }

        self.ring.read(&mut self.window, self.settings.read_size);
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(600) {
            tracing::debug!(
                "Frame {}: mode {}, ring head {}, tail {}",
                self.frame_count,
                self.mode,
                self.ring.head(),
                self.ring.tail()
            );
        }

        match self.mode {
            VisualizationMode::Waveform => {
                Some(FramePayload::Amplitudes(self.waveform.extract(&self.window)))
            }
            VisualizationMode::Spectral(topology) => {
                let view = self.spectral[topology.index()].as_mut()?;
                let heights = view.extractor.extract(&self.window);
                Some(FramePayload::Heights {
                    heights,
                    layout: &view.layout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DriverSettings {
        DriverSettings {
            read_size: 64,
            fft_order: 8,
            x_res: 16,
            z_res: 8,
            extents: MeshExtents {
                x_width: 3.0,
                y_height: 1.0,
                z_depth: 3.0,
            },
            skew_exponent: 0.2,
        }
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|n| (n as f32 * 0.4).sin()).collect()
    }

    #[test]
    fn test_stopped_driver_produces_nothing() {
        let ring = Arc::new(RingBuffer::new(2, 640));
        let mut driver = VisualizationDriver::new(ring, settings(), VisualizationMode::Waveform);

        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(driver.tick().is_none());

        driver.start();
        assert!(driver.tick().is_some());
        driver.toggle();
        assert!(!driver.is_running());
        assert!(driver.tick().is_none());
        assert_eq!(driver.frame_count(), 1);
    }

    #[test]
    fn test_waveform_payload_is_channel_sum() {
        let ring = Arc::new(RingBuffer::new(2, 640));
        let block = tone(100);
        ring.write(&[&block, &block], 0, block.len());

        let mut driver = VisualizationDriver::new(ring, settings(), VisualizationMode::Waveform);
        driver.start();

        match driver.tick() {
            Some(FramePayload::Amplitudes(samples)) => {
                assert_eq!(samples.len(), 64);
                for (s, expected) in samples.iter().zip(&block[36..]) {
                    assert!((s - 2.0 * expected).abs() < 1e-6);
                }
            }
            other => panic!("expected amplitudes, got {other:?}"),
        }
    }

    #[test]
    fn test_spectral_payload_carries_layout() {
        let ring = Arc::new(RingBuffer::new(2, 640));
        let block = tone(200);
        ring.write(&[&block, &block], 0, block.len());

        let mode = VisualizationMode::Spectral(MeshTopology::Circle);
        let mut driver = VisualizationDriver::new(ring, settings(), mode);
        driver.start();

        match driver.tick() {
            Some(FramePayload::Heights { heights, layout }) => {
                assert_eq!(heights.len(), 16 * 8);
                assert_eq!(layout.topology(), MeshTopology::Circle);
                assert!(heights[..16].iter().any(|h| *h > 0.0));
                assert!(heights[16..].iter().all(|h| *h == 0.0));
            }
            other => panic!("expected heights, got {other:?}"),
        }
    }

    #[test]
    fn test_switching_back_keeps_spectral_history() {
        let ring = Arc::new(RingBuffer::new(1, 640));
        let block = tone(200);
        ring.write(&[&block], 0, block.len());

        let grid = VisualizationMode::Spectral(MeshTopology::Grid);
        let mut driver = VisualizationDriver::new(ring, settings(), grid);
        driver.start();
        driver.tick();
        driver.tick();

        driver.set_mode(VisualizationMode::Waveform);
        driver.tick();
        driver.set_mode(grid);

        match driver.tick() {
            Some(FramePayload::Heights { heights, .. }) => {
                // Three spectral frames so far: rows 0..3 filled, the rest flat.
                assert!(heights[2 * 16..3 * 16].iter().any(|h| *h > 0.0));
                assert!(heights[3 * 16..].iter().all(|h| *h == 0.0));
            }
            other => panic!("expected heights, got {other:?}"),
        }
    }

    #[test]
    fn test_new_topology_starts_flat() {
        let ring = Arc::new(RingBuffer::new(1, 640));
        let block = tone(200);
        ring.write(&[&block], 0, block.len());

        let mut driver = VisualizationDriver::new(
            ring,
            settings(),
            VisualizationMode::Spectral(MeshTopology::Grid),
        );
        driver.start();
        driver.tick();
        driver.tick();

        driver.set_mode(VisualizationMode::Spectral(MeshTopology::Triangle));
        match driver.tick() {
            Some(FramePayload::Heights { heights, .. }) => {
                assert!(heights[16..].iter().all(|h| *h == 0.0));
            }
            other => panic!("expected heights, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_cycles_and_parses() {
        let mut mode = VisualizationMode::default();
        for _ in 0..VisualizationMode::ALL.len() {
            mode = mode.next();
        }
        assert_eq!(mode, VisualizationMode::default());
        assert_eq!(
            "Circle".parse::<VisualizationMode>().unwrap(),
            VisualizationMode::Spectral(MeshTopology::Circle)
        );
        assert_eq!(
            "waveform".parse::<VisualizationMode>().unwrap(),
            VisualizationMode::Waveform
        );
        assert!("square".parse::<VisualizationMode>().is_err());
    }

    #[test]
    #[should_panic(expected = "must be smaller than ring capacity")]
    fn test_read_size_at_capacity_panics() {
        let ring = Arc::new(RingBuffer::new(1, 64));
        let _driver = VisualizationDriver::new(ring, settings(), VisualizationMode::Waveform);
    }
}
