//! Live input capture feeding the ring buffer.
//!
//! The input callback is the producer: every block delivered by the device is
//! de-interleaved straight into the ring buffer. The callback never locks,
//! allocates or logs.

use anyhow::Result;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::devices::{find_input_device, suppress_alsa_warnings};
use super::ring_buffer::RingBuffer;

/// Captures audio from an input device into a shared ring buffer.
pub struct InputCapture {
    /// Device name, index or "default"
    device_name: String,
    /// Active input stream (kept alive while capturing)
    stream: Option<cpal::Stream>,
    /// Native sample rate of the opened device
    sample_rate: u32,
    /// Native channel count of the opened device
    device_channels: usize,
    /// Drops incoming blocks while set
    is_paused: Arc<AtomicBool>,
}

impl InputCapture {
    /// Creates a capture for `device_name` without opening it.
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            stream: None,
            sample_rate: 0,
            device_channels: 0,
            is_paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens the device at its native format and starts writing into `ring`.
    ///
    /// # Errors
    /// - If the device is not available
    /// - If its sample format is not supported
    /// - If the input stream cannot be built or started
    pub fn start(&mut self, ring: Arc<RingBuffer>) -> Result<()> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            find_input_device(&host, &self.device_name)
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Capture device: {}", device_name);

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        self.sample_rate = config.sample_rate.0;
        self.device_channels = config.channels as usize;

        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            self.sample_rate,
            self.device_channels,
            sample_format
        );

        if self.device_channels != ring.channels() {
            tracing::info!(
                "Mapping {} device channels onto {} ring channels",
                self.device_channels,
                ring.channels()
            );
        }

        let paused = Arc::clone(&self.is_paused);
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config, ring, paused)?,
            cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config, ring, paused)?,
            cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config, ring, paused)?,
            cpal::SampleFormat::I32 => build_input_stream::<i32>(&device, &config, ring, paused)?,
            other => anyhow::bail!("Unsupported input sample format: {other:?}"),
        };

        stream.play()?;
        self.stream = Some(stream);

        tracing::debug!("Capture stream started");
        Ok(())
    }

    /// Stops the stream. The ring buffer keeps its last contents.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Capture stream stopped");
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_channels(&self) -> usize {
        self.device_channels
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Relaxed)
    }

    /// Toggles between dropping and forwarding incoming blocks.
    pub fn toggle_pause(&self) {
        let paused = !self.is_paused.fetch_xor(true, Ordering::Relaxed);
        if paused {
            tracing::debug!("Capture paused");
        } else {
            tracing::debug!("Capture resumed");
        }
    }
}

/// Builds an input stream for sample type `T` that writes into `ring`.
fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: Arc<RingBuffer>,
    paused: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if paused.load(Ordering::Relaxed) {
                return;
            }
            ring.write_block(data, channels, f32::from_sample);
        },
        |err| {
            tracing::error!("Audio input stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}
