//! Typed sample chunk passed from the source thread to the display model.

/// Quantized sample value. Generated series stay inside the signed 16-bit range.
pub type Sample = i32;

/// A contiguous block of samples read from the source series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleChunk {
    /// Read cursor position the chunk was taken from.
    pub offset: usize,
    pub samples: Vec<Sample>,
}

impl SampleChunk {
    pub fn new(offset: usize, samples: Vec<Sample>) -> Self {
        Self { offset, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
