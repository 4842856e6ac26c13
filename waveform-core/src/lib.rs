//! # waveform-core
//!
//! Streams a precomputed synthetic waveform into a live display ring buffer.
//!
//! ## Architecture
//!
//! ```text
//! SinusoidalSource (own thread) ◄── SourceHandle request/oneshot reply
//!                                          │
//!                          tick loop (tokio, every chunk_length / sample_rate)
//!                                          │
//!                           DisplayModel::ingest → DisplayBuffer (ring)
//!                                          │
//!                          broadcast::Sender<BufferSnapshot> → render host
//! ```
//!
//! Only the source thread touches the series and its read cursor. Only the
//! run driving the engine mutates the display buffer.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod source;

// Convenience re-exports for downstream crates
pub use buffering::{DisplayBuffer, Sample, SampleChunk};
pub use engine::{EngineConfig, WaveformEngine};
pub use error::WaveformError;
pub use ipc::events::{BufferSnapshot, EngineStatus, EngineStatusEvent};
pub use source::{SampleSource, SinusoidalSource, SourceConfig};
