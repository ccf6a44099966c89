//! WAV file playback that feeds the ring buffer from the output callback.
//!
//! The file is decoded up front. The output callback plays it on the default
//! output device and writes the very block it just played into the ring
//! buffer, so the visuals follow what is heard.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::devices::{default_output_device, suppress_alsa_warnings};
use super::ring_buffer::RingBuffer;

/// Fully decoded audio file, one `f32` buffer per channel.
#[derive(Debug)]
pub struct DecodedAudio {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Decodes a PCM or float WAV file into normalized `f32` samples.
    ///
    /// # Errors
    /// - If the file cannot be opened or is not a valid WAV file
    /// - If the file has no channels
    pub fn from_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(anyhow!("{} has no audio channels", path.display()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
        };

        Ok(Self::from_interleaved(&interleaved, num_channels, spec.sample_rate))
    }

    /// Splits interleaved samples into per-channel buffers.
    pub fn from_interleaved(samples: &[f32], num_channels: usize, sample_rate: u32) -> Self {
        let frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Sample of `channel` at `frame`, reusing the last channel for wider outputs.
    #[inline]
    fn sample(&self, channel: usize, frame: usize) -> f32 {
        let channel = channel.min(self.channels.len() - 1);
        self.channels[channel][frame]
    }
}

/// Transport flags shared with the output callback.
#[derive(Debug, Default)]
struct Transport {
    paused: AtomicBool,
    finished: AtomicBool,
    /// Next frame to play
    position: AtomicUsize,
}

/// Plays a decoded file and mirrors every played block into the ring buffer.
pub struct FilePlayback {
    path: PathBuf,
    audio: Arc<DecodedAudio>,
    looping: bool,
    stream: Option<cpal::Stream>,
    transport: Arc<Transport>,
}

impl FilePlayback {
    /// Decodes `path` so playback can start without touching the disk.
    ///
    /// # Errors
    /// - If the file cannot be decoded
    pub fn open(path: &Path, looping: bool) -> Result<Self> {
        let audio = DecodedAudio::from_wav(path)?;
        tracing::info!(
            "Loaded {}: {:.2}s, {} channels at {}Hz",
            path.display(),
            audio.duration_secs(),
            audio.channel_count(),
            audio.sample_rate()
        );

        Ok(Self {
            path: path.to_path_buf(),
            audio: Arc::new(audio),
            looping,
            stream: None,
            transport: Arc::new(Transport::default()),
        })
    }

    /// Starts playback on the default output device.
    ///
    /// Prefers an output configuration at the file's sample rate and falls
    /// back to the device default, logging the mismatch.
    ///
    /// # Errors
    /// - If no output device is available
    /// - If its sample format is not supported
    /// - If the output stream cannot be built or started
    pub fn play(&mut self, ring: Arc<RingBuffer>) -> Result<()> {
        if self.stream.is_some() {
            self.transport.paused.store(false, Ordering::Relaxed);
            return Ok(());
        }

        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            default_output_device(&host)
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Playback device: {}", device_name);

        let supported = output_config_for_rate(&device, self.audio.sample_rate())?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        if config.sample_rate.0 != self.audio.sample_rate() {
            tracing::warn!(
                "File is {}Hz but device plays at {}Hz. Playback speed will differ.",
                self.audio.sample_rate(),
                config.sample_rate.0
            );
        }

        let source = StreamSource {
            audio: Arc::clone(&self.audio),
            transport: Arc::clone(&self.transport),
            ring,
            looping: self.looping,
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, source)?,
            cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, source)?,
            cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, source)?,
            cpal::SampleFormat::I32 => build_output_stream::<i32>(&device, &config, source)?,
            other => anyhow::bail!("Unsupported output sample format: {other:?}"),
        };

        stream.play()?;
        self.stream = Some(stream);
        tracing::debug!("Playback of {} started", self.path.display());
        Ok(())
    }

    /// Stops playback and rewinds to the start.
    pub fn stop(&mut self) {
        self.stream = None;
        self.transport.position.store(0, Ordering::Relaxed);
        self.transport.finished.store(false, Ordering::Relaxed);
        tracing::debug!("Playback stopped");
    }

    pub fn is_paused(&self) -> bool {
        self.transport.paused.load(Ordering::Relaxed)
    }

    /// Toggles between playing and outputting silence.
    pub fn toggle_pause(&self) {
        let paused = !self.transport.paused.fetch_xor(true, Ordering::Relaxed);
        if paused {
            tracing::debug!("Playback paused");
        } else {
            tracing::debug!("Playback resumed");
        }
    }

    /// Whether a non-looping file has played to its end.
    pub fn is_finished(&self) -> bool {
        self.transport.finished.load(Ordering::Relaxed)
    }

    /// Current playback position in seconds.
    pub fn position_secs(&self) -> f32 {
        self.transport.position.load(Ordering::Relaxed) as f32 / self.audio.sample_rate() as f32
    }

    pub fn duration_secs(&self) -> f32 {
        self.audio.duration_secs()
    }
}

/// State owned by the output callback.
struct StreamSource {
    audio: Arc<DecodedAudio>,
    transport: Arc<Transport>,
    ring: Arc<RingBuffer>,
    looping: bool,
}

impl StreamSource {
    /// Fills `out` (interleaved, `channels` wide) with the next frames of the file.
    ///
    /// Paused or finished transport yields silence.
    fn fill<T>(&self, out: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        let frames = self.audio.frames();
        let mut position = self.transport.position.load(Ordering::Relaxed);
        let paused = self.transport.paused.load(Ordering::Relaxed);

        for frame in out.chunks_exact_mut(channels) {
            if !paused && position >= frames && self.looping && frames > 0 {
                position = 0;
            }
            if paused || position >= frames {
                frame.fill(T::EQUILIBRIUM);
                continue;
            }
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = T::from_sample(self.audio.sample(channel, position));
            }
            position += 1;
        }

        if position >= frames && !self.looping {
            self.transport.finished.store(true, Ordering::Relaxed);
        }
        self.transport.position.store(position, Ordering::Relaxed);
    }

    /// Plays the next block into the device buffer and mirrors it into the ring.
    fn render<T>(&self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
        f32: FromSample<T>,
    {
        self.fill(data, channels);
        self.ring.write_block(data, channels, f32::from_sample);
    }
}

/// Picks an output configuration running at `sample_rate` if the device offers one.
fn output_config_for_rate(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let default = device.default_output_config()?;

    let matching = device
        .supported_output_configs()?
        .filter(|range| {
            range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
        })
        .find(|range| range.channels() == default.channels())
        .map(|range| range.with_sample_rate(cpal::SampleRate(sample_rate)));

    Ok(matching.unwrap_or(default))
}

/// Builds an output stream for sample type `T`.
///
/// The callback renders straight into the device buffer, so it never
/// allocates whatever block size the host picks.
fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source: StreamSource,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            source.render(data, channels);
        },
        |err| {
            tracing::error!("Audio output stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WindowSnapshot;

    fn source(looping: bool) -> StreamSource {
        let samples: Vec<f32> = (0..8).map(|v| v as f32).collect();
        StreamSource {
            audio: Arc::new(DecodedAudio::from_interleaved(&samples, 2, 8_000)),
            transport: Arc::new(Transport::default()),
            ring: Arc::new(RingBuffer::new(2, 16)),
            looping,
        }
    }

    #[test]
    fn test_from_interleaved_splits_channels() {
        let audio = DecodedAudio::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0], 2, 44_100);
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.sample(1, 1), -2.0);
        // A third output channel repeats the last file channel.
        assert_eq!(audio.sample(2, 0), -1.0);
    }

    #[test]
    fn test_fill_plays_frames_then_silence() {
        let source = source(false);
        let mut out = [9.0f32; 12];
        source.fill(&mut out, 2);

        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(source.transport.finished.load(Ordering::Relaxed));
    }

    #[test]
    fn test_fill_loops_when_enabled() {
        let source = source(true);
        let mut out = [0.0f32; 12];
        source.fill(&mut out, 2);

        assert_eq!(&out[8..], &[0.0, 1.0, 2.0, 3.0]);
        assert!(!source.transport.finished.load(Ordering::Relaxed));
        assert_eq!(source.transport.position.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_paused_fill_is_silent_and_keeps_position() {
        let source = source(false);
        source.transport.paused.store(true, Ordering::Relaxed);
        let mut out = [1.0f32; 4];
        source.fill(&mut out, 2);

        assert_eq!(out, [0.0; 4]);
        assert_eq!(source.transport.position.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_played_block_reaches_ring() {
        let source = source(false);
        let mut out = [0.0f32; 6];
        source.render(&mut out, 2);

        let mut window = WindowSnapshot::new(2, 3);
        source.ring.read(&mut window, 3);
        assert_eq!(window.channel(0), &[0.0, 2.0, 4.0]);
        assert_eq!(window.channel(1), &[1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_block_larger_than_ring_keeps_newest_frames() {
        // Ring holds 16 frames; the host asks for 20 in one callback.
        let source = source(true);
        let mut out = [0.0f32; 40];
        source.render(&mut out, 2);

        assert_eq!(&out[32..], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(source.ring.head(), 20 % 16);

        let mut window = WindowSnapshot::new(2, 3);
        source.ring.read(&mut window, 3);
        assert_eq!(window.channel(0), &[2.0, 4.0, 6.0]);
        assert_eq!(window.channel(1), &[3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_integer_output_is_converted() {
        let source = source(false);
        let mut out = [i16::MAX; 12];
        source.render(&mut out, 2);

        assert_eq!(out[0], 0);
        assert!(out[2] > 0);
        assert_eq!(&out[8..], &[0; 4]);
    }
}
