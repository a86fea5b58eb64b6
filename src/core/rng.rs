//! Random Number Sources
//!
//! Every probabilistic draw in the economy goes through [`RandomSource`].
//! Production seeds a Xorshift128+ generator from fresh entropy; tests seed
//! it explicitly so statistical checks are reproducible.

use sha2::{Sha256, Digest};

/// A uniform source of random values in `[0, 1)`.
///
/// Implementations must make every call an independent draw.
pub trait RandomSource {
    /// Draw one value uniformly from `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Seedable PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use keze_tap::core::rng::{DeterministicRng, RandomSource};
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_unit(), b.next_unit());
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG seeded from process entropy.
    ///
    /// Mixes a random v4 UUID with the wall clock through SHA-256.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self::new(derive_seed(uuid::Uuid::new_v4().as_bytes(), &nanos.to_le_bytes()))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }
}

impl RandomSource for DeterministicRng {
    /// Top 53 bits scaled into `[0, 1)`.
    #[inline]
    fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a 64-bit seed from arbitrary entropy material.
pub fn derive_seed(entropy: &[u8], salt: &[u8]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"KEZE_RNG_SEED_V1");
    hasher.update(entropy);
    hasher.update(salt);

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_unit_range() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..10_000 {
            let r = rng.next_unit();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_next_unit_mean() {
        let mut rng = DeterministicRng::new(99);
        let n = 100_000;
        let sum: f64 = (0..n).map(|_| rng.next_unit()).sum();
        let mean = sum / n as f64;
        assert!((mean - 0.5).abs() < 0.01, "mean {}", mean);
    }

    #[test]
    fn test_entropy_seeds_differ() {
        let mut a = DeterministicRng::from_entropy();
        let mut b = DeterministicRng::from_entropy();
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_derive_seed() {
        let seed1 = derive_seed(b"entropy", b"salt");
        let seed2 = derive_seed(b"entropy", b"salt");
        assert_eq!(seed1, seed2);
        assert_ne!(seed1, derive_seed(b"entropy", b"pepper"));
    }

    #[test]
    fn test_zero_seed_still_draws() {
        let mut rng = DeterministicRng::default();
        let draws: Vec<u64> = (0..4).map(|_| rng.next_u64()).collect();
        assert!(draws.iter().any(|&d| d != 0));
        assert_ne!(draws[0], draws[1]);
    }
}
