//! Core engine primitives.
//!
//! - Deterministic RNG (32-bit LCG, seed/reset/replay)
//! - Bounded ring buffer for decision history

pub mod history;
pub mod rng;

pub use history::RingBuffer;
pub use rng::SimRng;
