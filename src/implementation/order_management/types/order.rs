//! The order aggregate: a finalized, payable transaction snapshot.

use super::basic_types::{
    DraftOrderId, FulfillmentStatus, OrderId, OrderStatus, PaymentStatus, WorkflowStatus,
};
use super::items::{OrderDiscount, OrderItem};
use crate::implementation::fulfillment::Fulfillment;
use crate::payments::ledger::OrderPayment;
use crate::types::common::{current_timestamp, Address, Currency, CustomerId, StoreId};

/// Monetary breakdown, all amounts in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of line subtotals.
    pub subtotal_amount: u64,
    /// Order-level discount.
    pub discount_amount: u64,
    /// Shipping.
    pub shipping_amount: u64,
    /// Tax.
    pub tax_amount:      u64,
    /// Grand total.
    pub total_amount:    u64,
    /// Refunded to date.
    pub refunded_amount: u64,
}

impl OrderTotals {
    /// Computes totals from components: subtotal - discount + shipping + tax.
    #[must_use]
    pub fn compute(subtotal: u64, discount: u64, shipping: u64, tax: u64) -> Self {
        Self {
            subtotal_amount: subtotal,
            discount_amount: discount,
            shipping_amount: shipping,
            tax_amount:      tax,
            total_amount:    subtotal.saturating_sub(discount) + shipping + tax,
            refunded_amount: 0,
        }
    }
}

/// Timeline entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventType {
    /// Order created.
    Created,
    /// Converted from a draft.
    ConvertedFromDraft,
    /// Payment recorded.
    Paid,
    /// Items fulfilled.
    Fulfilled,
    /// Refund recorded.
    Refunded,
    /// Order canceled.
    Canceled,
    /// Order archived.
    Archived,
    /// Workflow flag changed.
    WorkflowChanged,
}

/// Timeline entry on an order.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// Event ID.
    pub id:          String,
    /// Event category.
    pub event_type:  OrderEventType,
    /// Human-readable description.
    pub description: String,
    /// Acting user, if user-initiated.
    pub user:        Option<String>,
    /// Timestamp.
    pub created_at:  u64,
}

/// A finalized, payable order.
#[derive(Debug, Clone)]
pub struct Order {
    /// Order ID.
    pub id:                 OrderId,
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
    /// Order status axis.
    pub status:             OrderStatus,
    /// Payment status axis.
    pub payment_status:     PaymentStatus,
    /// Fulfillment status axis.
    pub fulfillment_status: FulfillmentStatus,
    /// Operational workflow flag.
    pub workflow_status:    WorkflowStatus,
    /// Shipping address snapshot.
    pub shipping_address:   Address,
    /// Billing address snapshot.
    pub billing_address:    Option<Address>,
    /// Line items.
    pub items:              Vec<OrderItem>,
    /// Discount snapshots.
    pub discounts:          Vec<OrderDiscount>,
    /// Payment records.
    pub payments:           Vec<OrderPayment>,
    /// Fulfillment records.
    pub fulfillments:       Vec<Fulfillment>,
    /// Timeline.
    pub events:             Vec<OrderEvent>,
    /// Draft this order was converted from, if any.
    pub draft_id:           Option<DraftOrderId>,
    /// Lifecycle timestamps.
    pub placed_at:          u64,
    /// When payment landed.
    pub paid_at:            Option<u64>,
    /// When fully fulfilled.
    pub fulfilled_at:       Option<u64>,
    /// When canceled.
    pub canceled_at:        Option<u64>,
    /// When archived.
    pub archived_at:        Option<u64>,
    /// Last update timestamp.
    pub updated_at:         u64,
}

impl Order {
    /// Appends a timeline event.
    pub fn add_event(
        &mut self, event_type: OrderEventType, description: impl Into<String>,
        user: Option<String>,
    ) {
        self.events.push(OrderEvent {
            id: format!("evt_{}", uuid::Uuid::new_v4()),
            event_type,
            description: description.into(),
            user,
            created_at: current_timestamp(),
        });
        self.touch();
    }

    /// Total paid across all payment records.
    #[must_use]
    pub fn paid_amount(&self) -> u64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Total refunded across all payment records.
    #[must_use]
    pub fn payments_refunded_amount(&self) -> u64 {
        self.payments.iter().map(|p| p.refunded_amount).sum()
    }

    /// Whether a payment with this provider payment ID already exists.
    #[must_use]
    pub fn has_provider_payment(&self, provider_payment_id: &str) -> bool {
        self.payments
            .iter()
            .any(|p| p.provider_payment_id.as_deref() == Some(provider_payment_id))
    }

    /// Whether every line item is fully fulfilled.
    #[must_use]
    pub fn is_fully_fulfilled(&self) -> bool {
        self.items.iter().all(OrderItem::is_fulfilled)
    }

    /// Updates the timestamp.
    pub(crate) fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}
