//! Fulfillment: applying partial/full shipment to order line items and
//! adjusting inventory accordingly.

mod processor;

#[cfg(test)]
mod tests;

pub use processor::{FulfillmentProcessor, FulfillmentRequestLine};

use crate::types::common::current_timestamp;

/// One fulfilled line inside a fulfillment record.
#[derive(Debug, Clone)]
pub struct FulfillmentLine {
    /// Order item fulfilled.
    pub order_item_id: String,
    /// Quantity fulfilled by this record.
    pub quantity:      u32,
}

/// A fulfillment record: one per `fulfill_order` call, covering every
/// line shipped together.
#[derive(Debug, Clone)]
pub struct Fulfillment {
    /// Fulfillment ID.
    pub id:              String,
    /// Lines shipped.
    pub lines:           Vec<FulfillmentLine>,
    /// Carrier name.
    pub carrier:         Option<String>,
    /// Tracking number.
    pub tracking_number: Option<String>,
    /// Who performed the fulfillment.
    pub fulfilled_by:    Option<String>,
    /// Timestamp.
    pub created_at:      u64,
}

impl Fulfillment {
    /// Creates a new fulfillment record.
    #[must_use]
    pub fn new(
        lines: Vec<FulfillmentLine>, carrier: Option<String>, tracking_number: Option<String>,
        fulfilled_by: Option<String>,
    ) -> Self {
        Self {
            id: format!("ful_{}", uuid::Uuid::new_v4()),
            lines,
            carrier,
            tracking_number,
            fulfilled_by,
            created_at: current_timestamp(),
        }
    }
}
