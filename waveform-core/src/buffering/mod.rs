//! Fixed-capacity circular display buffer.
//!
//! Chunks are folded in at a write cursor that wraps at `capacity`; a chunk
//! that straddles the end is split across the tail and head of the slots.
//! After every ingest the running min/max is recomputed over all slots, so it
//! always describes the whole visible window rather than the newest chunk.

pub mod chunk;
pub mod display;

use crate::error::{Result, WaveformError};

pub use chunk::{Sample, SampleChunk};
pub use display::DisplayModel;

/// Ring buffer holding the most recent window of samples.
///
/// Only the consumer context mutates it; see [`DisplayModel`].
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    slots: Vec<Sample>,
    /// Next slot to overwrite. Always `< slots.len()`.
    write_index: usize,
    min: Sample,
    max: Sample,
}

impl DisplayBuffer {
    /// Allocate `capacity` zeroed slots.
    ///
    /// # Errors
    /// `InvalidConfig` for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(WaveformError::InvalidConfig(
                "display buffer capacity must be positive".into(),
            ));
        }
        Ok(Self {
            slots: vec![0; capacity],
            write_index: 0,
            min: 0,
            max: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn values(&self) -> &[Sample] {
        &self.slots
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn min(&self) -> Sample {
        self.min
    }

    pub fn max(&self) -> Sample {
        self.max
    }

    /// Copy `chunk` in at the write cursor, wrapping to slot 0 when it runs
    /// past the end.
    ///
    /// # Errors
    /// `ChunkTooLarge` if the chunk is longer than the buffer. Nothing is
    /// written in that case.
    pub fn ingest(&mut self, chunk: &[Sample]) -> Result<()> {
        let capacity = self.slots.len();
        if chunk.len() > capacity {
            return Err(WaveformError::ChunkTooLarge {
                len: chunk.len(),
                capacity,
            });
        }

        let start = self.write_index;
        let head_len = (capacity - start).min(chunk.len());
        let (head, tail) = chunk.split_at(head_len);

        self.slots[start..start + head_len].copy_from_slice(head);
        if tail.is_empty() {
            self.write_index = (start + head_len) % capacity;
        } else {
            self.slots[..tail.len()].copy_from_slice(tail);
            self.write_index = tail.len();
        }

        self.recompute_range();
        Ok(())
    }

    fn recompute_range(&mut self) {
        // slots is never empty, so the fold seeds are always replaced.
        let (min, max) = self
            .slots
            .iter()
            .fold((Sample::MAX, Sample::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        self.min = min;
        self.max = max;
    }
}
