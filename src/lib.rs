//! # Marketplace Core
//!
//! Order lifecycle and inventory reconciliation engine for a multi-tenant
//! marketplace: draft orders and their promotion to orders, inventory
//! reserve/fulfill/release accounting with an append-only adjustment
//! ledger, multi-store split checkouts, and webhook-driven payment
//! reconciliation.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

pub mod actions;
pub mod errors;
pub mod implementation;
pub mod payments;
pub mod types;

// Re-exports for public API
pub use errors::{ActionResponse, CommerceError, CommerceResult};
pub use implementation::CommerceCore;
pub use types::CommerceConfig;
