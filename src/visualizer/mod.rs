//! Frame-rate visualization of the shared audio ring buffer.
//!
//! The driver pulls one window per frame and hands the active extractor's
//! output to the terminal surface.

pub mod driver;
pub mod ui;
pub mod visualizations;

pub use driver::{DriverSettings, DriverState, FramePayload, VisualizationDriver, VisualizationMode};
pub use ui::{SourceStatus, VisualizerCommand, VisualizerTui};
