//! `WaveformEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! WaveformEngine::configure()   → source thread spawned, buffer unsized, status = Idle
//!     └─► start().await         → sample rate learned, series built, buffer sized
//!                                 and primed, tick loop spawned, status = Streaming
//!         └─► stop()            → run cancelled, status = Stopped
//! ```
//!
//! `start()`/`stop()` called in the wrong state return an error rather than
//! panicking. A stopped engine can be started again; the display buffer and
//! the source's read cursor carry over.
//!
//! ## Threading
//!
//! The source lives on its own thread behind a [`SourceHandle`]. The display
//! model is only mutated by whichever task is driving the current run (the
//! priming step inside `start()`, then the tick loop); `snapshot()` takes the
//! same lock briefly to copy the published state.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use crate::{
    buffering::DisplayModel,
    error::{Result, WaveformError},
    ipc::events::{BufferSnapshot, EngineStatus, EngineStatusEvent},
    source::{SampleSource, SinusoidalSource, SourceConfig, SourceHandle, UniformNoise},
};

/// Broadcast channel capacity: snapshots buffered for slow render hosts.
const BROADCAST_CAP: usize = 256;

/// Largest noise resolution the generator accepts, in bits.
const MAX_NOISE_RESOLUTION: u32 = 32;

/// Configuration for `WaveformEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of the precomputed source series in seconds. Default: 60.
    pub duration_seconds: u32,
    /// Signal sine frequency in Hz. Default: 3.
    pub signal_frequency: f32,
    /// Slow baseline sine frequency in Hz. Default: 0.1.
    pub baseline_frequency: f32,
    /// Noise amplitude in bits. Default: 12.
    pub noise_resolution: u32,
    /// Samples per second. Default: 75.
    pub sample_rate: u32,
    /// Samples moved per tick. Default: 25.
    pub chunk_length: usize,
    /// Width of the display window in seconds. Default: 1.
    pub display_seconds: u32,
    /// Fixed noise seed for reproducible series. `None` seeds from the OS.
    pub noise_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 60,
            signal_frequency: 3.0,
            baseline_frequency: 0.1,
            noise_resolution: 12,
            sample_rate: 75,
            chunk_length: 25,
            display_seconds: 1,
            noise_seed: None,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the generator or scheduler cannot run with.
    ///
    /// `chunk_length` against the display capacity is checked later, by
    /// `start()`, once the source has reported its sample rate.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(WaveformError::InvalidConfig(msg.into()));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.chunk_length == 0 {
            return invalid("chunk_length must be positive");
        }
        if self.duration_seconds == 0 {
            return invalid("duration_seconds must be positive");
        }
        if self.display_seconds == 0 {
            return invalid("display_seconds must be positive");
        }
        for (name, freq) in [
            ("signal_frequency", self.signal_frequency),
            ("baseline_frequency", self.baseline_frequency),
        ] {
            if !freq.is_finite() || freq < 0.0 {
                return Err(WaveformError::InvalidConfig(format!(
                    "{name} must be a finite, non-negative frequency (got {freq})"
                )));
            }
        }
        if self.noise_resolution > MAX_NOISE_RESOLUTION {
            return Err(WaveformError::InvalidConfig(format!(
                "noise_resolution must be at most {MAX_NOISE_RESOLUTION} bits"
            )));
        }
        Ok(())
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            duration_seconds: self.duration_seconds,
            signal_frequency: self.signal_frequency,
            baseline_frequency: self.baseline_frequency,
            noise_resolution: self.noise_resolution,
            sample_rate: self.sample_rate,
            chunk_length: self.chunk_length,
        }
    }

    /// Display capacity in samples for a given source rate.
    pub fn capacity_for(&self, sample_rate: u32) -> usize {
        self.display_seconds as usize * sample_rate as usize
    }
}

/// Tick period that moves `chunk_length` samples at `sample_rate` in real time.
pub fn read_interval(chunk_length: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(chunk_length as f64 / f64::from(sample_rate))
}

/// The top-level engine handle.
///
/// `WaveformEngine` is `Send + Sync`; wrap it in `Arc` to share it with
/// event-forwarding tasks.
pub struct WaveformEngine {
    config: EngineConfig,
    source: SourceHandle,
    display: Arc<Mutex<DisplayModel>>,
    /// `true` from the start of `start()` until `stop()`.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<EngineStatus>>,
    snapshot_tx: broadcast::Sender<BufferSnapshot>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
    /// Cancellation for the active run. Also serialises the spawn in
    /// `start()` against `stop()`.
    cancel: Mutex<Option<watch::Sender<bool>>>,
    /// Period of the active run, once known.
    read_interval: Mutex<Option<Duration>>,
}

impl WaveformEngine {
    /// Validate `config` and set up the default sinusoidal source.
    ///
    /// Nothing is computed yet; the series is built by `start()`.
    pub fn configure(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let source = SinusoidalSource::new(
            config.source_config(),
            UniformNoise::new(config.noise_seed),
        );
        Self::with_source(config, source)
    }

    /// Use a custom sample source. Only `display_seconds` is read from
    /// `config`; rate and chunk length come from the source itself.
    pub fn with_source<S: SampleSource>(config: EngineConfig, source: S) -> Result<Self> {
        if config.display_seconds == 0 {
            return Err(WaveformError::InvalidConfig(
                "display_seconds must be positive".into(),
            ));
        }

        let (snapshot_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let display = DisplayModel::new(config.display_seconds, snapshot_tx.clone());

        Ok(Self {
            source: SourceHandle::spawn(source)?,
            config,
            display: Arc::new(Mutex::new(display)),
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            snapshot_tx,
            status_tx,
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
            cancel: Mutex::new(None),
            read_interval: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Prime the display buffer and begin periodic ticking.
    ///
    /// Returns once the buffer holds its first chunk; ticks then continue on
    /// a spawned task. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `AlreadyRunning` if already started.
    /// - `NotRunning` if `stop()` was called before priming finished. The
    ///   buffer keeps the primed chunk but no tick loop is spawned.
    /// - `InvalidConfig` if the source reports a zero rate or chunk length.
    /// - `ChunkTooLarge` if a chunk would not fit in the display window.
    /// - `DegenerateSignal` / `InvalidConfig` from building the series.
    /// - `SourceClosed` if the source thread died.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WaveformError::AlreadyRunning);
        }
        self.set_status(EngineStatus::Starting, None);

        let period = match self.prime().await {
            Ok(period) => period,
            Err(e) => {
                error!(error = %e, "engine failed to start");
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                return Err(e);
            }
        };

        let mut cancel = self.cancel.lock();
        if !self.running.load(Ordering::SeqCst) {
            info!("stop requested while starting, tick loop not spawned");
            return Err(WaveformError::NotRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        if let Some(previous) = cancel.replace(cancel_tx) {
            let _ = previous.send(true);
        }
        *self.read_interval.lock() = Some(period);

        tokio::spawn(pipeline::run(pipeline::PipelineContext {
            source: self.source.clone(),
            display: Arc::clone(&self.display),
            read_interval: period,
            cancel: cancel_rx,
            status_tx: self.status_tx.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        }));

        self.set_status(EngineStatus::Streaming, None);
        info!(period_ms = period.as_millis() as u64, "engine started, streaming");
        Ok(())
    }

    /// Learn the source rate, size the buffer, and ingest the first chunk.
    async fn prime(&self) -> Result<Duration> {
        let info = self.source.describe().await?;
        if info.sample_rate == 0 || info.chunk_length == 0 {
            return Err(WaveformError::InvalidConfig(format!(
                "source reports sample_rate {} and chunk_length {}; both must be positive",
                info.sample_rate, info.chunk_length
            )));
        }
        let capacity = self.config.capacity_for(info.sample_rate);
        if info.chunk_length > capacity {
            return Err(WaveformError::ChunkTooLarge {
                len: info.chunk_length,
                capacity,
            });
        }

        self.source.build().await?;

        if self.display.lock().size(capacity)? {
            self.diagnostics
                .buffer_allocations
                .fetch_add(1, Ordering::Relaxed);
        }

        pipeline::pull_chunk(&self.source, &self.display, &self.diagnostics, None).await?;
        info!(
            sample_rate = info.sample_rate,
            chunk_length = info.chunk_length,
            capacity,
            "display buffer primed"
        );
        Ok(read_interval(info.chunk_length, info.sample_rate))
    }

    /// Cancel periodic ticking. A chunk already in flight is discarded.
    ///
    /// # Errors
    /// - `NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        let mut cancel = self.cancel.lock();
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(WaveformError::NotRunning);
        }
        if let Some(cancel) = cancel.take() {
            let _ = cancel.send(true);
        }
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Copy of the published display state.
    pub fn snapshot(&self) -> BufferSnapshot {
        self.display.lock().snapshot()
    }

    /// Subscribe to a snapshot per ingested chunk.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<BufferSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to status changes and tick failures.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Tick period of the current or last run; `None` before the first start.
    pub fn read_interval(&self) -> Option<Duration> {
        *self.read_interval.lock()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for WaveformEngine {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.get_mut().take() {
            let _ = cancel.send(true);
        }
    }
}
