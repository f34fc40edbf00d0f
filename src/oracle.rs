//! Incremental prime extension
//!
//! Grows an ascending, gap-free sequence of primes by trial division against
//! the primes already in the sequence. Soundness depends on the input being
//! complete: every prime below its last element must be present, otherwise a
//! composite with a missing factor would be accepted.

use crate::error::{PrimeError, PrimeResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trial-division prime extender
///
/// Pure apart from a candidate counter shared by all clones, which records
/// how many candidate values have been tested since creation.
#[derive(Debug, Clone, Default)]
pub struct PrimeOracle {
    tested: Arc<AtomicU64>,
}

impl PrimeOracle {
    /// Create an oracle with a fresh counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Total candidates tested by this oracle and its clones
    pub fn candidates_tested(&self) -> u64 {
        self.tested.load(Ordering::Relaxed)
    }

    /// Extend `known` until it holds at least `target` primes
    ///
    /// Returns `known` unchanged when it is already long enough.
    pub fn extend(&self, mut known: Vec<u64>, target: usize) -> PrimeResult<Vec<u64>> {
        if known.len() >= target {
            return Ok(known);
        }

        let mut candidate = match known.last() {
            Some(&last) => last
                .checked_add(1)
                .ok_or(PrimeError::ArithmeticOverflow(last))?,
            None => 2,
        };

        let mut tested = 0u64;
        while known.len() < target {
            tested += 1;
            if has_no_divisor(candidate, &known) {
                known.push(candidate);
            }
            candidate = candidate
                .checked_add(1)
                .ok_or(PrimeError::ArithmeticOverflow(candidate))?;
        }

        self.tested.fetch_add(tested, Ordering::Relaxed);
        Ok(known)
    }
}

/// True when no prime in `primes` up to floor(sqrt(candidate)) divides it
fn has_no_divisor(candidate: u64, primes: &[u64]) -> bool {
    let limit = floor_sqrt(candidate);
    primes
        .iter()
        .take_while(|&&p| p <= limit)
        .all(|&p| candidate % p != 0)
}

/// Integer square root, rounded down
pub fn floor_sqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Newton iteration from a power-of-two upper bound converges from above
    let bits = u64::BITS - n.leading_zeros();
    let mut x = 1u64 << bits.div_ceil(2);
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}
