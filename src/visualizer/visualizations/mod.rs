//! Per-frame extractors turning a read window into render payloads.
//!
//! Each extractor owns its own workspace and history; nothing is shared
//! between visualization modes.

pub mod mesh;
pub mod spectral;
pub mod waveform;

pub use mesh::{MeshExtents, MeshLayout, MeshTopology};
pub use spectral::{SpectralExtractor, SpectralSettings};
pub use waveform::WaveformExtractor;
