//! Persisted form of the prime sequence

use crate::error::{PrimeError, PrimeResult};
use crate::store::Versioned;
use serde::{Deserialize, Serialize};

/// Key holding the sequence record
pub const CACHE_KEY: &str = "primes:current";

#[derive(Serialize)]
struct SequenceRef<'a> {
    primes: &'a [u64],
}

#[derive(Deserialize)]
struct SequenceOwned {
    primes: Vec<u64>,
}

/// The sequence as last persisted, with its version
///
/// Version 0 means nothing has been written yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub version: u64,
    pub primes: Vec<u64>,
}

impl CacheSnapshot {
    /// Decode and validate a stored record
    pub fn from_record(record: Option<Versioned>) -> PrimeResult<Self> {
        let Some(record) = record else {
            return Ok(Self::default());
        };

        let decoded: SequenceOwned = serde_json::from_str(&record.value)
            .map_err(|e| PrimeError::CorruptCache(format!("undecodable record: {}", e)))?;
        validate(&decoded.primes)?;

        Ok(Self {
            version: record.version,
            primes: decoded.primes,
        })
    }

    /// Version to pass to compare-and-set
    pub fn expected_version(&self) -> Option<u64> {
        (self.version > 0).then_some(self.version)
    }

    /// Largest prime, if any
    pub fn largest(&self) -> Option<u64> {
        self.primes.last().copied()
    }
}

/// Serialize a sequence for storage
pub fn encode(primes: &[u64]) -> PrimeResult<String> {
    Ok(serde_json::to_string(&SequenceRef { primes })?)
}

/// Cheap structural checks: starts at 2, strictly ascending
///
/// Full primality is not re-verified on every load.
fn validate(primes: &[u64]) -> PrimeResult<()> {
    if let Some(&first) = primes.first() {
        if first != 2 {
            return Err(PrimeError::CorruptCache(format!(
                "sequence starts at {} instead of 2",
                first
            )));
        }
    }

    if let Some(pos) = primes.windows(2).position(|w| w[0] >= w[1]) {
        return Err(PrimeError::CorruptCache(format!(
            "sequence not strictly ascending at index {}",
            pos + 1
        )));
    }

    Ok(())
}
