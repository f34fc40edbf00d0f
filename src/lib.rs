//! primecache - first-N primes as an asynchronous, shared service
//!
//! Clients submit a count and get back a request ID. Workers pull IDs from a
//! queue and serve each request from one persisted prime sequence, extending
//! it under an exclusive lock when it is too short. Extensions are
//! checkpointed, so progress survives crashes and is never computed twice.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod event_log;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod queue;
pub mod service;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{PrimeError, PrimeResult};
