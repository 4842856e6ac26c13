use thiserror::Error;

/// All errors produced by waveform-core.
#[derive(Debug, Error)]
pub enum WaveformError {
    /// `value` is the first non-finite raw sample, or the level of a flat series.
    #[error("degenerate signal: raw series has no usable dynamic range (at {value})")]
    DegenerateSignal { value: f64 },

    #[error("chunk of {len} samples exceeds display capacity of {capacity}")]
    ChunkTooLarge { len: usize, capacity: usize },

    #[error("{0} used before initialization")]
    NotInitialized(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("sample source thread is gone")]
    SourceClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WaveformError>;
