//! Lock-free multi-channel ring buffer between the audio callback and the renderer.
//!
//! One producer (the audio callback) writes blocks at the shared `head` cursor,
//! one consumer (the frame loop) copies the most recent window ending at `head`.
//! The cursor is the only coordination: it is published with `Release` by the
//! writer and observed with `Acquire` by the reader. Samples are stored as `f32`
//! bit patterns in `AtomicU32` slots, so a read racing a write may see a mix of
//! old and new samples but never touches memory outside the storage.
//!
//! Every request must be strictly smaller than the capacity. Larger requests
//! would overwrite data before it is consumed and corrupt the cursor arithmetic,
//! so they are treated as fatal contract violations.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use super::window::WindowSnapshot;

/// Fixed-capacity circular sample store with a shared write cursor.
pub struct RingBuffer {
    /// Per-channel storage, `capacity` slots each
    channels: Box<[Box<[AtomicU32]>]>,
    capacity: usize,
    /// Next write position, shared by all channels
    head: AtomicUsize,
    /// End position of the last read (diagnostic only)
    tail: AtomicUsize,
}

impl RingBuffer {
    /// Allocates storage for `num_channels` channels of `capacity` samples each.
    ///
    /// Storage is never resized afterwards.
    ///
    /// # Panics
    /// - If `num_channels` is zero
    /// - If `capacity` is smaller than two samples
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        assert!(num_channels > 0, "RingBuffer needs at least one channel");
        assert!(
            capacity >= 2,
            "RingBuffer capacity must be at least two samples"
        );

        let channels = (0..num_channels)
            .map(|_| {
                (0..capacity)
                    .map(|_| AtomicU32::new(0.0f32.to_bits()))
                    .collect::<Box<[_]>>()
            })
            .collect();

        Self {
            channels,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Current write cursor.
    #[inline]
    pub fn head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    /// End position of the most recent read.
    #[inline]
    pub fn tail(&self) -> usize {
        self.tail.load(Ordering::Relaxed)
    }

    /// Copies `count` samples per channel from `sources[c][start..start + count]`
    /// into the buffer at the write cursor, wrapping past the end of storage.
    ///
    /// Must only be called from the single producer context. Never blocks or
    /// allocates.
    ///
    /// # Panics
    /// - If `count` is not smaller than the capacity
    /// - If fewer source channels than buffer channels are supplied
    /// - If a source slice is shorter than `start + count`
    pub fn write(&self, sources: &[&[f32]], start: usize, count: usize) {
        assert!(
            count < self.capacity,
            "ring buffer write of {count} samples must be smaller than capacity {}",
            self.capacity
        );
        assert!(
            sources.len() >= self.channels.len(),
            "ring buffer write needs {} source channels, got {}",
            self.channels.len(),
            sources.len()
        );

        // Only the producer moves head, so a relaxed load sees its own last store.
        let head = self.head.load(Ordering::Relaxed);
        let first = count.min(self.capacity - head);

        for (storage, source) in self.channels.iter().zip(sources) {
            let block = &source[start..start + count];
            store_slice(&storage[head..head + first], &block[..first]);
            store_slice(&storage[..count - first], &block[first..]);
        }

        self.head
            .store((head + count) % self.capacity, Ordering::Release);
    }

    /// Writes interleaved frames straight from an audio callback buffer.
    ///
    /// Ring channel `c` takes source channel `min(c, source_channels - 1)`, so a
    /// mono device feeds every ring channel. `convert` maps the device sample
    /// type to `f32`. Never blocks or allocates.
    ///
    /// # Panics
    /// - If `source_channels` is zero
    /// - If the number of frames is not smaller than the capacity
    pub fn write_interleaved<T, F>(&self, data: &[T], source_channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        assert!(source_channels > 0, "interleaved source needs at least one channel");
        let frames = data.len() / source_channels;
        assert!(
            frames < self.capacity,
            "ring buffer write of {frames} frames must be smaller than capacity {}",
            self.capacity
        );

        let head = self.head.load(Ordering::Relaxed);

        for (channel, storage) in self.channels.iter().enumerate() {
            let source_channel = channel.min(source_channels - 1);
            for (offset, frame) in data.chunks_exact(source_channels).enumerate() {
                let mut index = head + offset;
                if index >= self.capacity {
                    index -= self.capacity;
                }
                storage[index].store(convert(frame[source_channel]).to_bits(), Ordering::Relaxed);
            }
        }

        self.head
            .store((head + frames) % self.capacity, Ordering::Release);
    }

    /// Writes an interleaved callback block of any size.
    ///
    /// Blocks of `capacity` frames or more are split into pieces that each
    /// satisfy the write contract; only the newest `capacity - 1` frames
    /// survive. Never blocks or allocates.
    pub fn write_block<T, F>(&self, data: &[T], source_channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let max_samples = (self.capacity - 1) * source_channels.max(1);
        for chunk in data.chunks(max_samples) {
            self.write_interleaved(chunk, source_channels, &convert);
        }
    }

    /// Copies the `count` most recent samples of every channel into `destination`.
    ///
    /// The window ends at the write cursor observed on entry. Advances the
    /// diagnostic `tail` cursor by `count`.
    ///
    /// # Panics
    /// - If `count` is not smaller than the capacity
    /// - If `destination` holds fewer than `count` samples or a different
    ///   number of channels
    pub fn read(&self, destination: &mut WindowSnapshot, count: usize) {
        assert!(
            count < self.capacity,
            "ring buffer read of {count} samples must be smaller than capacity {}",
            self.capacity
        );
        assert!(
            destination.len() >= count,
            "read window holds {} samples, {count} requested",
            destination.len()
        );
        assert_eq!(
            destination.channel_count(),
            self.channels.len(),
            "read window channel count does not match ring buffer"
        );

        let head = self.head.load(Ordering::Acquire);
        let start = (head + self.capacity - count) % self.capacity;
        let first = count.min(self.capacity - start);

        for (storage, dest) in self.channels.iter().zip(destination.channels_mut()) {
            load_slice(&storage[start..start + first], &mut dest[..first]);
            load_slice(&storage[..count - first], &mut dest[first..count]);
        }

        let tail = self.tail.load(Ordering::Relaxed);
        self.tail
            .store((tail + count) % self.capacity, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("channels", &self.channels())
            .field("capacity", &self.capacity)
            .field("head", &self.head())
            .field("tail", &self.tail())
            .finish()
    }
}

#[inline]
fn store_slice(dst: &[AtomicU32], src: &[f32]) {
    for (slot, &sample) in dst.iter().zip(src) {
        slot.store(sample.to_bits(), Ordering::Relaxed);
    }
}

#[inline]
fn load_slice(src: &[AtomicU32], dst: &mut [f32]) {
    for (sample, slot) in dst.iter_mut().zip(src) {
        *sample = f32::from_bits(slot.load(Ordering::Relaxed));
    }
}
