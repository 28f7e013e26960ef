//! Line item and discount snapshots.
//!
//! Items snapshot title/SKU/price at order time so historical orders
//! survive later catalog edits.

use crate::implementation::inventory::VariantId;
use crate::types::common::current_timestamp;

/// Order line item snapshot.
#[derive(Debug, Clone)]
pub struct OrderItem {
    /// Line item ID.
    pub id:                 String,
    /// Listing reference.
    pub listing_id:         Option<String>,
    /// Variant reference.
    pub variant_id:         VariantId,
    /// Title snapshot.
    pub title:              String,
    /// SKU snapshot.
    pub sku:                Option<String>,
    /// Ordered quantity.
    pub quantity:           u32,
    /// Unit price in minor units.
    pub unit_price_amount:  u64,
    /// Line subtotal (quantity x unit price).
    pub subtotal_amount:    u64,
    /// Line-level discount.
    pub discount_amount:    u64,
    /// Line total after discount.
    pub total_amount:       u64,
    /// Quantity fulfilled so far. Monotonically non-decreasing, bounded
    /// by `quantity`.
    pub fulfilled_quantity: u32,
}

impl OrderItem {
    /// Remaining quantity to fulfill.
    #[must_use]
    pub fn remaining_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.fulfilled_quantity)
    }

    /// Whether the line is fully fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_quantity >= self.quantity
    }
}

/// Draft order line item. Same snapshot shape as [`OrderItem`] but no
/// fulfillment tracking — inventory is untouched while in draft state.
#[derive(Debug, Clone)]
pub struct DraftOrderItem {
    /// Line item ID.
    pub id:                String,
    /// Listing reference.
    pub listing_id:        Option<String>,
    /// Variant reference.
    pub variant_id:        VariantId,
    /// Title snapshot.
    pub title:             String,
    /// SKU snapshot.
    pub sku:               Option<String>,
    /// Quantity.
    pub quantity:          u32,
    /// Unit price in minor units.
    pub unit_price_amount: u64,
    /// Line subtotal.
    pub subtotal_amount:   u64,
    /// Line-level discount.
    pub discount_amount:   u64,
    /// Line total after discount.
    pub total_amount:      u64,
}

impl DraftOrderItem {
    /// Copies the draft line into an order line with nothing fulfilled.
    #[must_use]
    pub fn to_order_item(&self) -> OrderItem {
        OrderItem {
            id: format!("oi_{}", uuid::Uuid::new_v4()),
            listing_id: self.listing_id.clone(),
            variant_id: self.variant_id.clone(),
            title: self.title.clone(),
            sku: self.sku.clone(),
            quantity: self.quantity,
            unit_price_amount: self.unit_price_amount,
            subtotal_amount: self.subtotal_amount,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            fulfilled_quantity: 0,
        }
    }
}

/// Kind of discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    /// Percentage of the subtotal, in basis points.
    Percentage,
    /// Fixed amount in minor units.
    FixedAmount,
}

/// Snapshot of a discount as applied to one order.
///
/// Decoupled from the live discount entity so later edits never
/// retroactively alter historical orders.
#[derive(Debug, Clone)]
pub struct OrderDiscount {
    /// Snapshot ID.
    pub id:              String,
    /// Discount code.
    pub code:            String,
    /// Discount kind.
    pub kind:            DiscountKind,
    /// Raw value (basis points or minor units, per kind).
    pub value:           u64,
    /// Computed amount taken off this order, in minor units.
    pub computed_amount: u64,
    /// Timestamp.
    pub created_at:      u64,
}

impl OrderDiscount {
    /// Creates a discount snapshot.
    #[must_use]
    pub fn new(code: impl Into<String>, kind: DiscountKind, value: u64, computed_amount: u64) -> Self {
        Self {
            id: format!("disc_{}", uuid::Uuid::new_v4()),
            code: code.into(),
            kind,
            value,
            computed_amount,
            created_at: current_timestamp(),
        }
    }

    /// Computes the amount a discount takes off a subtotal.
    #[must_use]
    pub fn compute_amount(kind: DiscountKind, value: u64, subtotal: u64) -> u64 {
        match kind {
            DiscountKind::Percentage => subtotal * value / 10_000,
            DiscountKind::FixedAmount => value.min(subtotal),
        }
    }
}
