//! Periodic tick loop.
//!
//! ## Per tick
//!
//! ```text
//! 1. Wait for the next tick (or cancellation)
//! 2. Request one chunk from the source thread and await the reply
//! 3. Drop the chunk if the run was cancelled meanwhile
//! 4. Ingest into the display model (publishes a BufferSnapshot)
//! 5. On failure: count it, report a status event, keep ticking
//! ```
//!
//! Steps 2-4 finish before the loop waits again, so chunk N+1 is never
//! requested before chunk N has been ingested. Late ticks fire late
//! (`MissedTickBehavior::Delay`); nothing is batched or skipped.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    buffering::DisplayModel,
    error::Result,
    ipc::events::{BufferSnapshot, EngineStatus, EngineStatusEvent},
    source::SourceHandle,
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub ticks: AtomicUsize,
    pub samples_ingested: AtomicUsize,
    pub tick_errors: AtomicUsize,
    pub chunks_discarded: AtomicUsize,
    pub buffer_allocations: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            chunks_discarded: self.chunks_discarded.load(Ordering::Relaxed),
            buffer_allocations: self.buffer_allocations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub ticks: usize,
    pub samples_ingested: usize,
    pub tick_errors: usize,
    pub chunks_discarded: usize,
    pub buffer_allocations: usize,
}

/// All context the tick loop needs, passed as one struct so the spawn stays tidy.
pub struct PipelineContext {
    pub source: SourceHandle,
    pub display: Arc<Mutex<DisplayModel>>,
    pub read_interval: Duration,
    /// Flips to `true` when this run is stopped.
    pub cancel: watch::Receiver<bool>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Result of a single request/ingest cycle.
#[derive(Debug)]
pub enum TickOutcome {
    Ingested(BufferSnapshot),
    /// The run was cancelled while the request was in flight.
    Discarded,
}

/// Tick until `ctx.cancel` fires or the engine is dropped.
///
/// The first tick lands one `read_interval` after the call; the engine has
/// already primed the buffer by then.
pub async fn run(mut ctx: PipelineContext) {
    info!(
        period_ms = ctx.read_interval.as_millis() as u64,
        "tick loop started"
    );

    let mut ticker = time::interval_at(Instant::now() + ctx.read_interval, ctx.read_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Err means the engine was dropped; treat it like a stop.
            _ = ctx.cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        match pull_chunk(&ctx.source, &ctx.display, &ctx.diagnostics, Some(&ctx.cancel)).await {
            Ok(TickOutcome::Ingested(snapshot)) => {
                debug!(
                    seq = snapshot.seq,
                    write_index = snapshot.write_index,
                    y_min = snapshot.y_min,
                    y_max = snapshot.y_max,
                    "tick ingested"
                );
            }
            Ok(TickOutcome::Discarded) => break,
            Err(e) => {
                ctx.diagnostics.tick_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "tick failed, chunk dropped");
                let _ = ctx.status_tx.send(EngineStatusEvent {
                    status: EngineStatus::Streaming,
                    detail: Some(format!("tick failed: {e}")),
                });
            }
        }
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        ticks = snap.ticks,
        samples_ingested = snap.samples_ingested,
        tick_errors = snap.tick_errors,
        chunks_discarded = snap.chunks_discarded,
        "tick loop stopped, diagnostics"
    );
}

/// One request/ingest cycle. Shared by the engine's priming step (no
/// cancellation) and the tick loop.
pub async fn pull_chunk(
    source: &SourceHandle,
    display: &Mutex<DisplayModel>,
    diagnostics: &PipelineDiagnostics,
    cancel: Option<&watch::Receiver<bool>>,
) -> Result<TickOutcome> {
    diagnostics.ticks.fetch_add(1, Ordering::Relaxed);
    let chunk = source.read_chunk().await?;

    if cancel.is_some_and(|c| *c.borrow()) {
        diagnostics.chunks_discarded.fetch_add(1, Ordering::Relaxed);
        debug!(offset = chunk.offset, "run cancelled, discarding in-flight chunk");
        return Ok(TickOutcome::Discarded);
    }

    let snapshot = display.lock().ingest(&chunk.samples)?;
    diagnostics
        .samples_ingested
        .fetch_add(chunk.len(), Ordering::Relaxed);
    Ok(TickOutcome::Ingested(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::thread;

    use crate::buffering::{Sample, SampleChunk};
    use crate::source::SampleSource;

    /// Serves scripted chunks, then counting chunks once the script runs out.
    struct ScriptedSource {
        chunk_length: usize,
        script: VecDeque<Vec<Sample>>,
        delay: Duration,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(chunk_length: usize, script: Vec<Vec<Sample>>) -> Self {
            Self {
                chunk_length,
                script: script.into(),
                delay: Duration::ZERO,
                reads: 0,
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn sample_rate(&self) -> u32 {
            100
        }

        fn chunk_length(&self) -> usize {
            self.chunk_length
        }

        fn build(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_chunk(&mut self) -> Result<SampleChunk> {
            thread::sleep(self.delay);
            let n = self.reads;
            self.reads += 1;
            let samples = self
                .script
                .pop_front()
                .unwrap_or_else(|| vec![n as Sample; self.chunk_length]);
            Ok(SampleChunk::new(n * self.chunk_length, samples))
        }
    }

    struct Harness {
        ctx: PipelineContext,
        cancel_tx: watch::Sender<bool>,
        snapshots: broadcast::Receiver<BufferSnapshot>,
        status: broadcast::Receiver<EngineStatusEvent>,
        display: Arc<Mutex<DisplayModel>>,
        diagnostics: Arc<PipelineDiagnostics>,
    }

    fn harness(source: ScriptedSource, capacity: usize, read_interval: Duration) -> Harness {
        let (snapshot_tx, snapshots) = broadcast::channel(64);
        let (status_tx, status) = broadcast::channel(16);
        let (cancel_tx, cancel) = watch::channel(false);

        let mut model = DisplayModel::new(1, snapshot_tx);
        model.size(capacity).unwrap();
        let display = Arc::new(Mutex::new(model));
        let diagnostics = Arc::new(PipelineDiagnostics::default());

        let ctx = PipelineContext {
            source: SourceHandle::spawn(source).unwrap(),
            display: Arc::clone(&display),
            read_interval,
            cancel,
            status_tx,
            diagnostics: Arc::clone(&diagnostics),
        };
        Harness {
            ctx,
            cancel_tx,
            snapshots,
            status,
            display,
            diagnostics,
        }
    }

    async fn next_snapshot(rx: &mut broadcast::Receiver<BufferSnapshot>) -> BufferSnapshot {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for snapshot")
            .expect("snapshot channel closed")
    }

    #[tokio::test]
    async fn pull_chunk_ingests_and_counts() {
        let h = harness(ScriptedSource::new(3, vec![vec![4, 5, 6]]), 6, Duration::from_millis(5));

        let outcome = pull_chunk(&h.ctx.source, &h.display, &h.diagnostics, None)
            .await
            .unwrap();
        match outcome {
            TickOutcome::Ingested(snap) => {
                assert_eq!(snap.seq, 1);
                assert_eq!(&snap.values[..3], &[4, 5, 6]);
                assert_eq!(snap.write_index, 3);
            }
            TickOutcome::Discarded => panic!("nothing was cancelled"),
        }
        let diag = h.diagnostics.snapshot();
        assert_eq!(diag.ticks, 1);
        assert_eq!(diag.samples_ingested, 3);
    }

    #[tokio::test]
    async fn pull_chunk_discards_after_cancel() {
        let h = harness(ScriptedSource::new(2, vec![]), 4, Duration::from_millis(5));
        h.cancel_tx.send(true).unwrap();

        let outcome = pull_chunk(&h.ctx.source, &h.display, &h.diagnostics, Some(&h.ctx.cancel))
            .await
            .unwrap();
        assert!(matches!(outcome, TickOutcome::Discarded));
        assert_eq!(h.display.lock().snapshot().seq, 0);
        assert_eq!(h.diagnostics.snapshot().chunks_discarded, 1);
    }

    #[tokio::test]
    async fn failed_tick_is_reported_and_loop_keeps_going() {
        let script = vec![vec![1, 1], vec![9; 5], vec![2, 2]];
        let mut h = harness(ScriptedSource::new(2, script), 4, Duration::from_millis(5));
        let handle = tokio::spawn(run(h.ctx));

        let first = next_snapshot(&mut h.snapshots).await;
        let second = next_snapshot(&mut h.snapshots).await;
        h.cancel_tx.send(true).unwrap();
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("tick loop did not stop")
            .expect("tick loop panicked");

        assert_eq!(first.values, vec![1, 1, 0, 0]);
        // The oversized chunk was dropped whole; the next one lands after the first.
        assert_eq!(second.seq, 2);
        assert_eq!(second.values, vec![1, 1, 2, 2]);

        let event = h.status.try_recv().expect("status event for failed tick");
        assert_eq!(event.status, EngineStatus::Streaming);
        let detail = event.detail.expect("failed tick carries a detail");
        assert!(detail.contains("exceeds display capacity of 4"), "{detail}");
        assert_eq!(h.diagnostics.snapshot().tick_errors, 1);
    }

    #[tokio::test]
    async fn cancel_during_slow_read_discards_chunk_and_stops() {
        let mut source = ScriptedSource::new(2, vec![]);
        source.delay = Duration::from_millis(150);
        let h = harness(source, 4, Duration::from_millis(5));
        let cancel_tx = h.cancel_tx;
        let diagnostics = h.diagnostics;
        let display = h.display;
        let handle = tokio::spawn(run(h.ctx));

        // Let the first tick fire and its read get stuck in the source.
        time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("tick loop did not stop")
            .expect("tick loop panicked");

        let diag = diagnostics.snapshot();
        assert_eq!(diag.ticks, 1);
        assert_eq!(diag.chunks_discarded, 1);
        assert_eq!(display.lock().snapshot().seq, 0);
    }

    #[tokio::test]
    async fn dropping_cancel_sender_stops_loop() {
        let h = harness(ScriptedSource::new(2, vec![]), 4, Duration::from_millis(5));
        let handle = tokio::spawn(run(h.ctx));
        drop(h.cancel_tx);
        time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("tick loop did not stop")
            .expect("tick loop panicked");
    }
}
