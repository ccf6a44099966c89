//! Configuration management for spectromesh.
//!
//! Audio and visualization settings are loaded from a TOML file in the
//! user's config directory and validated before any audio session starts.

pub mod file;

pub use file::{get_config_path, VisualizerConfig};
