//! # Inventory Ledger
//!
//! Per-location stock counters with an append-only adjustment ledger.
//! Every counter mutation writes exactly one adjustment row while the
//! levels lock is held, so current counters are always replayable from
//! the ledger.

pub mod types;

mod service;

#[cfg(test)]
mod tests;

pub use service::InventoryService;
pub use types::*;
