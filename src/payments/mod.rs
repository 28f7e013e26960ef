//! Payment surface: provider contract, webhook event models, the
//! per-order payment ledger, and the reconciler that turns verified
//! webhook deliveries into order state.
//!
//! Amounts and charge references are always re-fetched from the
//! provider; the webhook payload is only trusted for the event type and
//! the object ID it points at.

pub mod events;
pub mod ledger;
pub mod provider;
pub mod reconciler;

#[cfg(test)]
mod tests;

pub use ledger::{
    BalanceEntryKind, OrderPayment, SellerBalanceTransaction, SellerLedger, TransferStatus,
};
pub use provider::{
    verify_signature, CheckoutPurpose, CheckoutSession, PaymentIntent, PaymentProvider,
    ProviderRefund, StoreCharge, Transfer, TransferRequest,
};
pub use reconciler::{PaymentReconciler, WebhookOutcome};
