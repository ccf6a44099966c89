//! Live or file-driven visualization session.
//!
//! Wires an audio source into a shared ring buffer, runs the driver on a
//! fixed frame interval and draws every payload in the terminal. SIGUSR1
//! starts or stops the driver from outside, e.g. from a window manager binding.

use anyhow::anyhow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{FilePlayback, InputCapture, RingBuffer};
use crate::config::VisualizerConfig;
use crate::visualizer::{
    SourceStatus, VisualizationDriver, VisualizationMode, VisualizerCommand, VisualizerTui,
};

/// Options taken from the command line, overriding the config file.
#[derive(Debug, Clone, Default)]
pub struct VisualizeOptions {
    pub file: Option<PathBuf>,
    pub mode: Option<VisualizationMode>,
    pub device: Option<String>,
    pub looping: bool,
}

/// The producer feeding the ring buffer.
enum AudioSource {
    Live(InputCapture),
    File(FilePlayback, String),
}

impl AudioSource {
    fn start(
        config: &VisualizerConfig,
        file: Option<&Path>,
        looping: bool,
        ring: Arc<RingBuffer>,
    ) -> anyhow::Result<Self> {
        match file {
            Some(path) => {
                let mut playback = FilePlayback::open(path, looping)?;
                playback.play(ring)?;
                let label = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Ok(Self::File(playback, label))
            }
            None => {
                let mut capture = InputCapture::new(config.audio.device.clone());
                capture.start(ring)?;
                tracing::info!(
                    "Capturing at {}Hz from {} device channels",
                    capture.sample_rate(),
                    capture.device_channels()
                );
                Ok(Self::Live(capture))
            }
        }
    }

    fn toggle_pause(&self) {
        match self {
            Self::Live(capture) => capture.toggle_pause(),
            Self::File(playback, _) => playback.toggle_pause(),
        }
    }

    fn status(&self, device_label: &str) -> SourceStatus {
        match self {
            Self::Live(capture) => SourceStatus {
                label: device_label.to_string(),
                paused: capture.is_paused(),
                progress: None,
                finished: false,
            },
            Self::File(playback, label) => SourceStatus {
                label: label.clone(),
                paused: playback.is_paused(),
                progress: Some((playback.position_secs(), playback.duration_secs())),
                finished: playback.is_finished(),
            },
        }
    }

    fn stop(&mut self) {
        match self {
            Self::Live(capture) => capture.stop(),
            Self::File(playback, _) => playback.stop(),
        }
    }
}

/// Runs the visualizer until the user quits.
///
/// # Errors
/// - If the configuration is invalid
/// - If the audio source cannot be opened
/// - If the terminal cannot be driven
pub async fn handle_visualize(options: VisualizeOptions) -> Result<(), anyhow::Error> {
    tracing::info!("=== spectromesh started ===");

    let mut config = VisualizerConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        anyhow!("Configuration error: {e}")
    })?;
    if let Some(device) = options.device {
        config.audio.device = device;
    }
    if let Some(mode) = options.mode {
        config.visualization.mode = mode;
    }
    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        anyhow!("Configuration error: {e}")
    })?;

    let capacity = config.ring_capacity();
    tracing::info!(
        "Configuration loaded: device={}, channels={}, ring capacity={}, read size={}, fft order={}, mesh={}x{}",
        config.audio.device,
        config.audio.channels,
        capacity,
        config.visualization.read_size,
        config.visualization.fft_order,
        config.visualization.x_res,
        config.visualization.z_res
    );

    let ring = Arc::new(RingBuffer::new(config.audio.channels, capacity));
    let mut source = AudioSource::start(
        &config,
        options.file.as_deref(),
        options.looping,
        Arc::clone(&ring),
    )?;

    let settings = config.driver_settings();
    let mut driver = VisualizationDriver::new(ring, settings, config.visualization.mode);
    driver.start();

    let mut tui = VisualizerTui::new(settings.extents, settings.x_res * settings.z_res)?;

    let toggle_requested = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&toggle_requested))
        .map_err(|e| anyhow!("Failed to register signal handler: {e}"))?;

    let mut interval =
        tokio::time::interval(Duration::from_millis(config.visualization.frame_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::debug!("Entering frame loop");
    let result = loop {
        interval.tick().await;

        if toggle_requested.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: toggling visualization");
            driver.toggle();
        }

        match tui.handle_input(Duration::ZERO) {
            Ok(VisualizerCommand::Continue) => {}
            Ok(VisualizerCommand::Quit) => break Ok(()),
            Ok(VisualizerCommand::TogglePause) => source.toggle_pause(),
            Ok(VisualizerCommand::ToggleRunning) => driver.toggle(),
            Ok(VisualizerCommand::NextMode) => driver.set_mode(driver.mode().next()),
            Ok(VisualizerCommand::SelectMode(mode)) => driver.set_mode(mode),
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                break Err(anyhow!("Input handling error: {e}"));
            }
        }

        let status = source.status(&config.audio.device);
        let mode = driver.mode();
        let state = driver.state();
        let payload = driver.tick();
        if let Err(e) = tui.render(payload, mode, state, &status) {
            tracing::error!("Render failed: {}", e);
            break Err(anyhow!("Render failed: {e}"));
        }
    };

    driver.stop();
    source.stop();
    tui.cleanup()
        .map_err(|e| anyhow!("Cleanup failed: {e}"))?;

    tracing::info!(
        "=== spectromesh exited after {} frames ===",
        driver.frame_count()
    );
    result
}
