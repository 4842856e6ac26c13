//! Noise sources mixed into the generated series.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Yields one noise draw in `[0, 1]` per sample.
pub trait NoiseSource: Send + 'static {
    fn next_unit(&mut self) -> f64;
}

/// Uniform noise from a `StdRng`, optionally seeded for reproducible series.
#[derive(Debug, Clone)]
pub struct UniformNoise {
    rng: StdRng,
}

impl UniformNoise {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl Default for UniformNoise {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NoiseSource for UniformNoise {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..=1.0)
    }
}

/// Always zero. Leaves the generated series fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNoise;

impl NoiseSource for SilentNoise {
    fn next_unit(&mut self) -> f64 {
        0.0
    }
}
