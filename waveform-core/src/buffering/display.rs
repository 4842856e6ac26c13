//! Consumer-side owner of the display buffer.
//!
//! The buffer cannot be sized until the source's sample rate is known, so it
//! starts out empty. Every successful ingest bumps `seq` and broadcasts a
//! fresh [`BufferSnapshot`] to subscribers.

use tokio::sync::broadcast;
use tracing::debug;

use super::{DisplayBuffer, Sample};
use crate::error::{Result, WaveformError};
use crate::ipc::events::BufferSnapshot;

pub struct DisplayModel {
    buffer: Option<DisplayBuffer>,
    display_seconds: u32,
    seq: u64,
    snapshot_tx: broadcast::Sender<BufferSnapshot>,
}

impl DisplayModel {
    pub fn new(display_seconds: u32, snapshot_tx: broadcast::Sender<BufferSnapshot>) -> Self {
        Self {
            buffer: None,
            display_seconds,
            seq: 0,
            snapshot_tx,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.buffer.as_ref().map(DisplayBuffer::capacity)
    }

    /// Allocate the buffer on first call; later calls keep the existing one.
    ///
    /// Returns `true` if this call allocated.
    pub fn size(&mut self, capacity: usize) -> Result<bool> {
        if let Some(existing) = &self.buffer {
            debug!(
                capacity = existing.capacity(),
                requested = capacity,
                "display buffer already sized"
            );
            return Ok(false);
        }
        self.buffer = Some(DisplayBuffer::new(capacity)?);
        debug!(capacity, "display buffer allocated");
        Ok(true)
    }

    /// Fold a chunk into the buffer and publish the new state.
    ///
    /// # Errors
    /// - `NotInitialized` before [`size`](Self::size).
    /// - `ChunkTooLarge` from the ring buffer; no state changes and nothing
    ///   is published.
    pub fn ingest(&mut self, chunk: &[Sample]) -> Result<BufferSnapshot> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or(WaveformError::NotInitialized("display buffer"))?;
        buffer.ingest(chunk)?;
        self.seq += 1;

        let snapshot = self.snapshot();
        // No subscribers is fine; snapshot() still serves pollers.
        let _ = self.snapshot_tx.send(snapshot.clone());
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        match &self.buffer {
            Some(buffer) => BufferSnapshot {
                seq: self.seq,
                values: buffer.values().to_vec(),
                write_index: buffer.write_index(),
                y_min: buffer.min(),
                y_max: buffer.max(),
                t_min: 0,
                t_max: self.display_seconds,
            },
            None => BufferSnapshot::placeholder(self.display_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> (DisplayModel, broadcast::Receiver<BufferSnapshot>) {
        let (tx, rx) = broadcast::channel(8);
        (DisplayModel::new(1, tx), rx)
    }

    #[test]
    fn ingest_before_sizing_is_not_initialized() {
        let (mut model, _rx) = model();
        let err = model.ingest(&[1, 2]).unwrap_err();
        assert!(matches!(err, WaveformError::NotInitialized(_)));
        assert_eq!(model.snapshot(), BufferSnapshot::placeholder(1));
    }

    #[test]
    fn sizing_happens_once() {
        let (mut model, _rx) = model();
        assert!(model.size(10).unwrap());
        model.ingest(&[4; 3]).unwrap();

        assert!(!model.size(20).unwrap());
        assert_eq!(model.capacity(), Some(10));
        assert_eq!(&model.snapshot().values[..3], &[4, 4, 4]);
    }

    #[test]
    fn ingest_publishes_snapshot_with_sequence() {
        let (mut model, mut rx) = model();
        model.size(4).unwrap();

        model.ingest(&[1, -3]).unwrap();
        model.ingest(&[2]).unwrap();

        let first = rx.try_recv().expect("first snapshot");
        let second = rx.try_recv().expect("second snapshot");
        assert_eq!(first.seq, 1);
        assert_eq!(first.write_index, 2);
        assert_eq!(second.seq, 2);
        assert_eq!(second.values, vec![1, -3, 2, 0]);
        assert_eq!((second.y_min, second.y_max), (-3, 2));
        assert_eq!(second.t_max, 1);
    }

    #[test]
    fn failed_ingest_publishes_nothing() {
        let (mut model, mut rx) = model();
        model.size(2).unwrap();

        assert!(model.ingest(&[1, 2, 3]).is_err());
        assert!(rx.try_recv().is_err());
        assert_eq!(model.snapshot().seq, 0);
    }
}
