//! Audio hand-off between the audio callback and the frame loop.
//!
//! Producers (live capture or file playback) write into a shared lock-free
//! ring buffer; the visualizer reads the most recent window every frame.

pub mod capture;
pub mod devices;
pub mod playback;
pub mod ring_buffer;
pub mod window;

pub use capture::InputCapture;
pub use playback::FilePlayback;
pub use ring_buffer::RingBuffer;
pub use window::WindowSnapshot;
