//! Draft orders: mutable pre-orders for manual creation and invoicing.

use super::basic_types::{DraftOrderId, OrderId};
use super::items::{DraftOrderItem, OrderDiscount};
use super::order::OrderTotals;
use crate::types::common::{current_timestamp, Address, Currency, CustomerId, StoreId};

/// Invoice metadata for payment-link delivery.
#[derive(Debug, Clone, Default)]
pub struct DraftInvoice {
    /// Opaque payment-link token.
    pub token:      Option<String>,
    /// Token expiry (unix seconds).
    pub expires_at: Option<u64>,
    /// How many times the invoice has been sent.
    pub send_count: u32,
    /// Last send timestamp.
    pub last_sent_at: Option<u64>,
}

impl DraftInvoice {
    /// Whether the current token is still usable.
    #[must_use]
    pub fn is_token_valid(&self, now: u64) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }
}

/// A mutable pre-order. Inventory is NOT reserved while in draft state —
/// only upon conversion to an order.
#[derive(Debug, Clone)]
pub struct DraftOrder {
    /// Draft order ID.
    pub id:                 DraftOrderId,
    /// Human-readable number.
    pub number:             String,
    /// Owning store.
    pub store_id:           StoreId,
    /// Customer reference.
    pub customer_id:        CustomerId,
    /// Customer email snapshot.
    pub customer_email:     String,
    /// Currency.
    pub currency:           Currency,
    /// Monetary breakdown.
    pub totals:             OrderTotals,
    /// Line items.
    pub items:              Vec<DraftOrderItem>,
    /// Discount snapshots.
    pub discounts:          Vec<OrderDiscount>,
    /// Shipping address snapshot.
    pub shipping_address:   Address,
    /// Billing address snapshot.
    pub billing_address:    Option<Address>,
    /// Whether the draft has been promoted to an order.
    pub completed:          bool,
    /// The order this draft became, once completed.
    pub converted_to_order: Option<OrderId>,
    /// Invoice payment-link metadata.
    pub invoice:            DraftInvoice,
    /// Creation timestamp.
    pub created_at:         u64,
    /// Last update timestamp.
    pub updated_at:         u64,
}

impl DraftOrder {
    /// Updates the timestamp.
    pub(crate) fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}
