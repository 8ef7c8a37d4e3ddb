//! Deterministic random number generation.
//!
//! Implements a 32-bit linear congruential generator with the Numerical
//! Recipes constants. Quality is modest but the sequence is fully determined
//! by the seed, which is what repeatable combat estimates need.
//!
//! # Reproducibility Guarantee
//!
//! Given the same seed and the same sequence of calls, every value is
//! bitwise-identical across runs and platforms. [`SimRng::reset`] rewinds to
//! the first value.

use rand::{Error as RandError, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// LCG multiplier.
const MULTIPLIER: u32 = 1_664_525;
/// LCG increment.
const INCREMENT: u32 = 1_013_904_223;
/// 2^32 as a float divisor.
const MODULUS: f64 = 4_294_967_296.0;

/// Deterministic, reproducible random number generator.
///
/// `state' = (a * state + c) mod 2^32`, exposed as `state' / 2^32`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    /// Seed the generator started from (restored by `reset`).
    seed: u32,
    /// Current generator value.
    state: u32,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { seed, state: seed }
    }

    /// Get the seed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Replace the seed and restart the sequence from it.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.state = seed;
    }

    /// Rewind to the original seed.
    pub fn reset(&mut self) {
        self.state = self.seed;
    }

    /// Current internal state (for audit and snapshots).
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    fn advance(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.advance()) / MODULUS
    }

    /// Roll one die with `sides` faces, returning 1..=sides.
    ///
    /// A zero-sided die yields 0 without consuming state.
    pub fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        let face = (self.next_f64() * f64::from(sides)) as u32;
        face.min(sides - 1) + 1
    }

    /// Roll `count` dice with `sides` faces and sum them, saturating at `u32::MAX`.
    pub fn roll_dice(&mut self, count: u32, sides: u32) -> u32 {
        (0..count).fold(0, |total, _| total.saturating_add(self.roll_die(sides)))
    }

    /// Roll a d20 twice and keep the higher.
    pub fn roll_advantage(&mut self) -> u32 {
        let a = self.roll_die(20);
        let b = self.roll_die(20);
        a.max(b)
    }

    /// Roll a d20 twice and keep the lower.
    pub fn roll_disadvantage(&mut self) -> u32 {
        let a = self.roll_die(20);
        let b = self.roll_die(20);
        a.min(b)
    }

    /// Bernoulli trial: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Generate n uniform samples in [0, 1).
    #[must_use]
    pub fn sample_n(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.next_f64()).collect()
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(12_345)
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        self.advance()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.advance());
        let lo = u64::from(self.advance());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.advance().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SimRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Property: Same seed produces same sequence.
    #[test]
    fn test_reproducibility() {
        let mut rng1 = SimRng::new(42);
        let mut rng2 = SimRng::new(42);

        let seq1: Vec<f64> = (0..100).map(|_| rng1.next_f64()).collect();
        let seq2: Vec<f64> = (0..100).map(|_| rng2.next_f64()).collect();

        assert_eq!(seq1, seq2, "Same seed must produce identical sequences");
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = SimRng::new(42);
        let mut rng2 = SimRng::new(43);

        let seq1: Vec<f64> = (0..100).map(|_| rng1.next_f64()).collect();
        let seq2: Vec<f64> = (0..100).map(|_| rng2.next_f64()).collect();

        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_roll_dice_saturates() {
        let mut rng = SimRng::new(42);
        let total = rng.roll_dice(8, u32::MAX);
        assert!(total >= 8);
        assert_eq!(rng.roll_dice(0, 6), 0);
    }

    #[test]
    fn test_known_first_value() {
        // 1664525 * 1 + 1013904223 = 1015568748
        let mut rng = SimRng::new(1);
        assert_eq!(rng.next_u32(), 1_015_568_748);
    }

    #[test]
    fn test_reset_reproduces_first_value() {
        let mut rng = SimRng::new(7);
        let first = rng.next_f64();
        for _ in 0..50 {
            rng.next_f64();
        }
        rng.reset();
        assert_eq!(rng.next_f64().to_bits(), first.to_bits());
    }

    #[test]
    fn test_set_seed_restarts_sequence() {
        let mut rng = SimRng::new(1);
        rng.next_f64();
        rng.set_seed(99);
        assert_eq!(rng.seed(), 99);
        let mut fresh = SimRng::new(99);
        assert_eq!(rng.next_f64().to_bits(), fresh.next_f64().to_bits());
    }

    #[test]
    fn test_roll_die_bounds() {
        let mut rng = SimRng::new(42);
        for sides in [2, 4, 6, 8, 10, 12, 20, 100] {
            for _ in 0..500 {
                let v = rng.roll_die(sides);
                assert!((1..=sides).contains(&v), "d{sides} rolled {v}");
            }
        }
    }

    #[test]
    fn test_roll_zero_sided_die() {
        let mut rng = SimRng::new(42);
        let before = rng.state();
        assert_eq!(rng.roll_die(0), 0);
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn test_every_face_appears() {
        let mut rng = SimRng::new(3);
        let mut seen = [false; 20];
        for _ in 0..2000 {
            seen[(rng.roll_die(20) - 1) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_roll_dice_mean() {
        let mut rng = SimRng::new(42);
        let n = 20_000;
        let total: u64 = (0..n).map(|_| u64::from(rng.roll_dice(2, 6))).sum();
        let mean = total as f64 / f64::from(n);
        assert!((mean - 7.0).abs() < 0.1, "2d6 mean {mean} too far from 7");
    }

    #[test]
    fn test_advantage_ordering() {
        let mut rng = SimRng::new(11);
        let n = 10_000;
        let adv: u32 = (0..n).map(|_| rng.roll_advantage()).sum();
        let disadv: u32 = (0..n).map(|_| rng.roll_disadvantage()).sum();
        // E[adv] = 13.825, E[disadv] = 7.175
        assert!(f64::from(adv) / f64::from(n) > 13.0);
        assert!(f64::from(disadv) / f64::from(n) < 8.0);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = SimRng::new(5);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_chance_frequency() {
        let mut rng = SimRng::new(8);
        let hits = (0..10_000).filter(|_| rng.chance(0.3)).count();
        let freq = hits as f64 / 10_000.0;
        assert!((freq - 0.3).abs() < 0.02, "frequency {freq}");
    }

    #[test]
    fn test_rand_trait_interop() {
        use rand::Rng;
        let mut rng = SimRng::new(42);
        for _ in 0..100 {
            let v: u32 = rng.gen_range(1..=6);
            assert!((1..=6).contains(&v));
        }
        let mut bytes = [0u8; 7];
        rng.fill_bytes(&mut bytes);
        assert!(bytes.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_seedable_from_seed() {
        let rng = SimRng::from_seed(42u32.to_le_bytes());
        assert_eq!(rng.seed(), 42);
    }

    #[test]
    fn test_sample_n() {
        let mut rng = SimRng::new(42);
        let samples = rng.sample_n(10);
        assert_eq!(samples.len(), 10);
        for s in &samples {
            assert!(*s >= 0.0 && *s < 1.0);
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: reproducibility holds for any seed.
        #[test]
        fn prop_reproducibility(seed in any::<u32>()) {
            let mut rng1 = SimRng::new(seed);
            let mut rng2 = SimRng::new(seed);

            let seq1: Vec<u64> = (0..100).map(|_| rng1.next_f64().to_bits()).collect();
            let seq2: Vec<u64> = (0..100).map(|_| rng2.next_f64().to_bits()).collect();

            prop_assert_eq!(seq1, seq2);
        }

        /// Falsification test: values in [0, 1) for any seed.
        #[test]
        fn prop_unit_interval(seed in any::<u32>()) {
            let mut rng = SimRng::new(seed);
            for _ in 0..100 {
                let v = rng.next_f64();
                prop_assert!((0.0..1.0).contains(&v), "Value {} not in [0, 1)", v);
            }
        }

        /// Falsification test: reset then next reproduces the first value.
        #[test]
        fn prop_reset_replays(seed in any::<u32>(), skip in 0usize..64) {
            let mut rng = SimRng::new(seed);
            let first = rng.next_f64();
            for _ in 0..skip {
                rng.next_f64();
            }
            rng.reset();
            prop_assert_eq!(rng.next_f64().to_bits(), first.to_bits());
        }
    }
}
