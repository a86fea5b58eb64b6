//! Core primitives shared by the economy rules.
//!
//! Randomness and time are both injected so the transition rules stay pure
//! functions of their inputs.

pub mod clock;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, SystemClock};
pub use rng::{DeterministicRng, RandomSource};
