/// Seeded xorshift generator: the only source of randomness in a render.
///
/// Two generators built from the same seed and driven through the same
/// calls produce identical results, which is what makes a render
/// reproducible from its seed.

use thiserror::Error;

/// Outputs discarded right after seeding.
const WARM_UP_ROUNDS: usize = 10;

/// 2^53, the divisor that maps 53 random bits onto `[0, 1)`.
const F64_SCALE: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RandomError {
    #[error("cannot choose from empty weights")]
    EmptyWeights,
    #[error("invalid range: min ({min}) must be <= max ({max})")]
    InvalidRange { min: u64, max: u64 },
}

/// Xorshift64 (13/7/17) with a fixed warm-up.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    /// Seed zero is remapped to one; xorshift never leaves the all-zero state.
    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: if seed == 0 { 1 } else { seed },
        };
        for _ in 0..WARM_UP_ROUNDS {
            rng.next_u64();
        }
        rng
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform integer in `[0, exclusive_max)`; `0` yields `0`.
    pub fn uniform_index(&mut self, exclusive_max: usize) -> usize {
        if exclusive_max == 0 {
            return 0;
        }
        (self.next_u64() % exclusive_max as u64) as usize
    }

    /// Uniform float in `[0, 1)` from the top 53 bits of one output.
    pub fn uniform_float(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / F64_SCALE
    }

    /// Uniform integer in `[min, max]`.
    pub fn range(&mut self, min: u64, max: u64) -> Result<u64, RandomError> {
        if min > max {
            return Err(RandomError::InvalidRange { min, max });
        }
        if min == max {
            return Ok(min);
        }
        let value = self.next_u64();
        Ok(match (max - min).checked_add(1) {
            Some(size) => min + value % size,
            // The full u64 span: every output is already in range.
            None => value,
        })
    }

    /// Pick an index with probability proportional to its weight.
    ///
    /// A single weight always yields `0`. When the weights sum to zero or
    /// less the choice degrades to uniform over all indices.
    pub fn weighted_choice(&mut self, weights: &[f64]) -> Result<usize, RandomError> {
        match weights.len() {
            0 => return Err(RandomError::EmptyWeights),
            1 => return Ok(0),
            _ => {}
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Ok(self.uniform_index(weights.len()));
        }

        let mut target = self.uniform_float() * total;
        for (i, weight) in weights.iter().enumerate() {
            target -= weight;
            if target <= 0.0 {
                return Ok(i);
            }
        }

        // Float rounding can leave a sliver past the last weight.
        Ok(weights.len() - 1)
    }
}
