//! Configuration file management for spectromesh.
//!
//! Settings live in `~/.config/spectromesh/spectromesh.toml`. A file with the
//! default values is written on first run. Every value is fixed for the life
//! of an audio session.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::visualizer::visualizations::MeshExtents;
use crate::visualizer::{DriverSettings, VisualizationMode};

/// Audio source and ring buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Input device for live capture. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `spectromesh list-devices`
    /// - device name from `spectromesh list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Channels kept in the ring buffer
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Expected samples per audio callback
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Ring capacity as a multiple of the larger of block size and read size
    #[serde(default = "default_ring_multiplier")]
    pub ring_multiplier: usize,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_channels() -> usize {
    2
}

fn default_block_size() -> usize {
    512
}

fn default_ring_multiplier() -> usize {
    10
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            channels: default_channels(),
            block_size: default_block_size(),
            ring_multiplier: default_ring_multiplier(),
        }
    }
}

/// Visualization pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualizationConfig {
    /// "grid", "line", "circle", "triangle" or "waveform"
    #[serde(default)]
    pub mode: VisualizationMode,
    /// Samples read from the ring buffer every frame
    #[serde(default = "default_read_size")]
    pub read_size: usize,
    /// FFT length is 2^fft_order
    #[serde(default = "default_fft_order")]
    pub fft_order: u32,
    /// Mesh columns
    #[serde(default = "default_x_res")]
    pub x_res: usize,
    /// Mesh rows (history depth)
    #[serde(default = "default_z_res")]
    pub z_res: usize,
    #[serde(default = "default_extent")]
    pub x_width: f32,
    #[serde(default = "default_y_height")]
    pub y_height: f32,
    #[serde(default = "default_extent")]
    pub z_depth: f32,
    /// Column skew exponent (smaller gives more columns to low frequencies)
    #[serde(default = "default_skew_exponent")]
    pub skew_exponent: f32,
    /// Frame interval in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_read_size() -> usize {
    256
}

fn default_fft_order() -> u32 {
    10
}

fn default_x_res() -> usize {
    80
}

fn default_z_res() -> usize {
    81
}

fn default_extent() -> f32 {
    3.0
}

fn default_y_height() -> f32 {
    1.0
}

fn default_skew_exponent() -> f32 {
    0.2
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            mode: VisualizationMode::default(),
            read_size: default_read_size(),
            fft_order: default_fft_order(),
            x_res: default_x_res(),
            z_res: default_z_res(),
            x_width: default_extent(),
            y_height: default_y_height(),
            z_depth: default_extent(),
            skew_exponent: default_skew_exponent(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualizerConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

impl VisualizerConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults first if the file does not exist yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path)?;
        Self::from_toml(&config_content)
            .map_err(|e| anyhow!("Invalid config {}: {e}", config_path.display()))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    /// - If the TOML is malformed
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// Ring buffer capacity per channel.
    pub fn ring_capacity(&self) -> usize {
        self.audio
            .block_size
            .max(self.visualization.read_size)
            .saturating_mul(self.audio.ring_multiplier)
    }

    /// Rejects settings that would break the pipeline's size contracts.
    ///
    /// # Errors
    /// - If any size, resolution or extent is out of range
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        let vis = &self.visualization;

        if audio.channels == 0 {
            bail!("audio.channels must be at least 1");
        }
        if audio.block_size == 0 {
            bail!("audio.block_size must be at least 1");
        }
        if audio.ring_multiplier < 2 {
            bail!("audio.ring_multiplier must be at least 2");
        }
        if vis.read_size == 0 {
            bail!("visualization.read_size must be at least 1");
        }
        if !(1..=16).contains(&vis.fft_order) {
            bail!("visualization.fft_order must be between 1 and 16");
        }
        let fft_size = 1usize << vis.fft_order;
        if vis.read_size > fft_size {
            bail!(
                "visualization.read_size ({}) must not exceed the FFT size 2^{} = {}",
                vis.read_size,
                vis.fft_order,
                fft_size
            );
        }
        if vis.read_size >= self.ring_capacity() {
            bail!(
                "visualization.read_size ({}) must be smaller than the ring capacity ({})",
                vis.read_size,
                self.ring_capacity()
            );
        }
        if vis.x_res < 2 {
            bail!("visualization.x_res must be at least 2");
        }
        if vis.z_res == 0 {
            bail!("visualization.z_res must be at least 1");
        }
        for (name, value) in [
            ("x_width", vis.x_width),
            ("y_height", vis.y_height),
            ("z_depth", vis.z_depth),
            ("skew_exponent", vis.skew_exponent),
        ] {
            if !(value.is_finite() && value > 0.0) {
                bail!("visualization.{name} must be a positive number, got {value}");
            }
        }
        if vis.frame_interval_ms == 0 {
            bail!("visualization.frame_interval_ms must be at least 1");
        }

        Ok(())
    }

    /// Driver construction parameters derived from the visualization section.
    pub fn driver_settings(&self) -> DriverSettings {
        let vis = &self.visualization;
        DriverSettings {
            read_size: vis.read_size,
            fft_order: vis.fft_order,
            x_res: vis.x_res,
            z_res: vis.z_res,
            extents: MeshExtents {
                x_width: vis.x_width,
                y_height: vis.y_height,
                z_depth: vis.z_depth,
            },
            skew_exponent: vis.skew_exponent,
        }
    }
}

/// Retrieves the path to the config file, creating its directory.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("spectromesh");

    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("spectromesh.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::visualizations::MeshTopology;

    #[test]
    fn test_defaults_are_valid() {
        let config = VisualizerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.ring_capacity(), 5120);
        assert_eq!(config.driver_settings().read_size, 256);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = VisualizerConfig::from_toml(
            r#"
            [audio]
            device = "1"

            [visualization]
            mode = "triangle"
            x_res = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.device, "1");
        assert_eq!(config.audio.channels, 2);
        assert_eq!(
            config.visualization.mode,
            VisualizationMode::Spectral(MeshTopology::Triangle)
        );
        assert_eq!(config.visualization.x_res, 40);
        assert_eq!(config.visualization.z_res, 81);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = VisualizerConfig::default();
        config.visualization.mode = VisualizationMode::Waveform;
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains(r#"mode = "waveform""#));
        assert_eq!(VisualizerConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let result = VisualizerConfig::from_toml("[visualization]\nmode = \"square\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_read_size_limits() {
        let mut config = VisualizerConfig::default();
        config.visualization.read_size = 1024;
        config.audio.block_size = 64;
        config.audio.ring_multiplier = 2;
        config.validate().unwrap();
        assert_eq!(config.ring_capacity(), 2048);

        config.visualization.read_size = 1025;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("FFT size"), "{err}");

        config.visualization.read_size = 256;
        config.audio.ring_multiplier = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_values_are_rejected() {
        let mut config = VisualizerConfig::default();
        config.visualization.x_res = 1;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.audio.channels = 0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.visualization.y_height = 0.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.visualization.fft_order = 0;
        assert!(config.validate().is_err());
    }
}
