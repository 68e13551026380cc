//! Deterministic seeded sequence generator for puzzle derivation.
//!
//! Every execution site that derives a daily puzzle must produce the exact
//! same draw sequence for the same seed, so the recurrence is pinned rather
//! than delegated to a library generator: `state = (state * 1664525 +
//! 1013904223) mod 2^32`, emitting `state / 2^32`. The constants and the
//! float emission are part of the cross-site contract and must never change.

/// Restartable, infinite, deterministic sequence of values in `[0, 1)`.
///
/// The 32-bit linear congruential recurrence matches what the authoritative
/// daily job computes; products stay below 2^53, so the float math is exact
/// on every platform.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    /// Create a generator with its state initialized to `seed`.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance the state and emit the next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        f64::from(self.state) / 4_294_967_296.0
    }

    /// Draw a uniform index in `[0, len)` as `floor(next() * len)`.
    ///
    /// `len` must be positive. For `len <= 2^21` the product is exactly
    /// representable, so truncation reproduces the reference floor semantics
    /// bit-for-bit.
    pub fn pick_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_f64() * len as f64) as usize
    }

    /// Fisher-Yates shuffle in place, drawing swap index `floor(next() *
    /// (i + 1))` for `i` from `len - 1` down to `1`.
    ///
    /// One generator value is consumed per swap. The iteration direction and
    /// the draw-per-swap rule are part of the derivation contract.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.pick_index(i + 1);
            items.swap(i, j);
        }
    }
}
