//! Incremental prime cache
//!
//! One shared, persisted, ascending sequence of every prime found so far.
//!
//! # Invariants
//!
//! - Gap-free: for every k up to the largest cached prime, k is prime iff it
//!   is cached. The oracle relies on this to test candidates.
//! - Append-only: no element ever moves or disappears.
//! - One writer at a time, enforced by [`ExtensionLock`]; any number of
//!   readers.
//!
//! # Extension
//!
//! | Step | Action |
//! |------|--------|
//! | lock | acquire the extension lock (timeout → retryable error) |
//! | re-check | return at once if the target is already met |
//! | batch | run the oracle for `checkpoint_interval` new primes |
//! | checkpoint | compare-and-set the record; renew the lease |
//! | release | always, on every exit path |

pub mod lock;
pub mod sequence;
pub mod store;

pub use lock::{ExtensionGuard, ExtensionLock};
pub use sequence::{CacheSnapshot, CACHE_KEY};
pub use store::{CacheOptions, PrimeCacheStore, Prefix};
