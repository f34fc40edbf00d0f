//! Request ledger module

#[allow(clippy::module_inception)]
pub mod ledger;
pub mod request;

pub use ledger::{Claim, RequestLedger};
pub use request::{RequestStatus, TaskRequest};
