//! Deterministic linear congruential generator.
//!
//! Used to nudge coincident nodes apart so runs are reproducible for a given seed.

const A: u64 = 214_013;
const C: u64 = 2_531_011;
const M: u64 = 2_147_483_648;
const RANGE: f64 = 32_767.0;

#[derive(Debug, Clone)]
pub struct PseudoRandom {
    seed: u64,
}

impl Default for PseudoRandom {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PseudoRandom {
    pub fn new(seed: u64) -> Self {
        Self { seed: seed % M }
    }

    /// Next value in `[0, 1]`.
    pub fn next(&mut self) -> f64 {
        self.seed = (self.seed * A + C) % M;
        (self.seed >> 16) as f64 / RANGE
    }

    pub fn next_between(&mut self, min: f64, max: f64) -> f64 {
        min + self.next() * (max - min)
    }
}
