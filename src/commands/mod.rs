//! Application command handlers for spectromesh.
//!
//! # Commands
//! - `visualize`: Live capture or WAV playback with real-time visualization
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod visualize;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use visualize::{handle_visualize, VisualizeOptions};
