//! Sample sources and the producer thread that owns them.
//!
//! A `SampleSource` is stateful (it carries a read cursor), so it is moved
//! onto a dedicated thread and never shared. The consumer talks to it only
//! through a [`SourceHandle`]: each request goes over a `crossbeam-channel`
//! queue and carries a `tokio::sync::oneshot` for the reply, so async callers
//! can await the answer without blocking the runtime. Requests are served one
//! at a time, in order.

pub mod noise;
pub mod sinusoid;

pub use noise::{NoiseSource, SilentNoise, UniformNoise};
pub use sinusoid::{SinusoidalSource, SourceConfig};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::debug;

use crate::buffering::SampleChunk;
use crate::error::{Result, WaveformError};

/// Contract for anything that serves fixed-size chunks of a sample series.
pub trait SampleSource: Send + 'static {
    fn sample_rate(&self) -> u32;

    fn chunk_length(&self) -> usize;

    /// Prepare the series. Must be safe to call more than once.
    fn build(&mut self) -> Result<()>;

    /// Return the next `chunk_length()` samples.
    ///
    /// # Errors
    /// `NotInitialized` if called before a successful `build()`.
    fn read_chunk(&mut self) -> Result<SampleChunk>;
}

/// What the consumer learns from the source before sizing its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub sample_rate: u32,
    pub chunk_length: usize,
}

enum SourceRequest {
    Describe(oneshot::Sender<SourceInfo>),
    Build(oneshot::Sender<Result<()>>),
    ReadChunk(oneshot::Sender<Result<SampleChunk>>),
}

/// Cloneable handle to a source running on its own thread.
///
/// The thread exits once every handle has been dropped.
#[derive(Clone)]
pub struct SourceHandle {
    tx: Sender<SourceRequest>,
}

impl SourceHandle {
    /// Move `source` onto a new `waveform-source` thread.
    pub fn spawn<S: SampleSource>(source: S) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::Builder::new()
            .name("waveform-source".into())
            .spawn(move || serve(source, rx))?;
        Ok(Self { tx })
    }

    pub async fn describe(&self) -> Result<SourceInfo> {
        self.request(SourceRequest::Describe).await
    }

    pub async fn build(&self) -> Result<()> {
        self.request(SourceRequest::Build).await?
    }

    pub async fn read_chunk(&self) -> Result<SampleChunk> {
        self.request(SourceRequest::ReadChunk).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SourceRequest,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| WaveformError::SourceClosed)?;
        reply_rx.await.map_err(|_| WaveformError::SourceClosed)
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle").finish_non_exhaustive()
    }
}

fn serve<S: SampleSource>(mut source: S, rx: Receiver<SourceRequest>) {
    debug!("source thread started");
    for request in rx.iter() {
        // A dropped reply receiver means the caller gave up; keep serving.
        match request {
            SourceRequest::Describe(reply) => {
                let _ = reply.send(SourceInfo {
                    sample_rate: source.sample_rate(),
                    chunk_length: source.chunk_length(),
                });
            }
            SourceRequest::Build(reply) => {
                let _ = reply.send(source.build());
            }
            SourceRequest::ReadChunk(reply) => {
                let _ = reply.send(source.read_chunk());
            }
        }
    }
    debug!("source thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingSource;

    impl SampleSource for PanickingSource {
        fn sample_rate(&self) -> u32 {
            10
        }

        fn chunk_length(&self) -> usize {
            1
        }

        fn build(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_chunk(&mut self) -> Result<SampleChunk> {
            panic!("source failure");
        }
    }

    fn small_source() -> SinusoidalSource {
        SinusoidalSource::new(
            SourceConfig {
                duration_seconds: 1,
                sample_rate: 20,
                chunk_length: 5,
                ..SourceConfig::default()
            },
            SilentNoise,
        )
    }

    #[tokio::test]
    async fn describe_round_trips_source_parameters() {
        let handle = SourceHandle::spawn(small_source()).unwrap();
        let info = handle.describe().await.unwrap();
        assert_eq!(
            info,
            SourceInfo {
                sample_rate: 20,
                chunk_length: 5
            }
        );
    }

    #[tokio::test]
    async fn reads_are_served_in_order_after_build() {
        let handle = SourceHandle::spawn(small_source()).unwrap();

        let err = handle.read_chunk().await.unwrap_err();
        assert!(matches!(err, WaveformError::NotInitialized(_)));

        handle.build().await.unwrap();
        let mut offsets = Vec::new();
        for _ in 0..5 {
            let chunk = handle.read_chunk().await.unwrap();
            assert_eq!(chunk.len(), 5);
            offsets.push(chunk.offset);
        }
        assert_eq!(offsets, vec![0, 5, 10, 15, 0]);
    }

    #[tokio::test]
    async fn dead_source_thread_reports_closed() {
        let handle = SourceHandle::spawn(PanickingSource).unwrap();
        assert!(matches!(
            handle.read_chunk().await,
            Err(WaveformError::SourceClosed)
        ));
        assert!(matches!(
            handle.describe().await,
            Err(WaveformError::SourceClosed)
        ));
    }
}
