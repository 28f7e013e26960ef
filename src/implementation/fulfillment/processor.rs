//! Fulfillment processor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{Fulfillment, FulfillmentLine};
use crate::errors::CommerceError;
use crate::implementation::inventory::{InventoryService, StockLine};
use crate::implementation::order_management::status::{can_fulfill, derive_status};
use crate::implementation::order_management::types::basic_types::{FulfillmentStatus, OrderId};
use crate::implementation::order_management::types::order::{Order, OrderEventType};
use crate::implementation::order_management::OrderService;
use crate::types::common::current_timestamp;

/// One requested line of a fulfillment call.
#[derive(Debug, Clone)]
pub struct FulfillmentRequestLine {
    /// Order item to fulfill.
    pub order_item_id: String,
    /// Quantity to fulfill now.
    pub quantity:      u32,
}

/// Applies fulfillment to orders and inventory.
#[derive(Debug, Clone)]
pub struct FulfillmentProcessor {
    orders:    Arc<OrderService>,
    inventory: Arc<InventoryService>,
}

impl FulfillmentProcessor {
    /// Creates a processor over the shared services.
    #[must_use]
    pub fn new(orders: Arc<OrderService>, inventory: Arc<InventoryService>) -> Self {
        Self { orders, inventory }
    }

    /// Fulfills the requested quantities on an order.
    ///
    /// The whole call is validated before any mutation: a single line
    /// that would over-fulfill rejects everything, leaving the other
    /// lines untouched. Inventory moves through the ledger's `fulfill`
    /// path (committed and on-hand down, available unchanged).
    pub fn fulfill_order(
        &self, order_id: &OrderId, requested: &[FulfillmentRequestLine],
        carrier: Option<String>, tracking_number: Option<String>, fulfilled_by: Option<String>,
    ) -> Result<Order, CommerceError> {
        if requested.is_empty() {
            return Err(CommerceError::ValidationError(
                "nothing to fulfill: no lines requested".to_string(),
            ));
        }

        // Collapse duplicate item references so cumulative quantities
        // are validated, not each mention separately.
        let mut wanted: HashMap<String, u32> = HashMap::new();
        for line in requested {
            let entry = wanted.entry(line.order_item_id.clone()).or_insert(0);
            *entry = entry.checked_add(line.quantity).ok_or_else(|| {
                CommerceError::ValidationError(format!(
                    "requested quantity for line item {} is out of range",
                    line.order_item_id
                ))
            })?;
        }

        let inventory = Arc::clone(&self.inventory);
        self.orders.with_order_mut(order_id, |order| {
            can_fulfill(order)?;

            // All-or-nothing validation pass before any mutation.
            for (item_id, qty) in &wanted {
                let item = order
                    .items
                    .iter()
                    .find(|i| &i.id == item_id)
                    .ok_or_else(|| {
                        CommerceError::ValidationError(format!(
                            "order {} has no line item {}",
                            order.id, item_id
                        ))
                    })?;
                if *qty > item.remaining_quantity() {
                    return Err(CommerceError::ValidationError(format!(
                        "cannot fulfill {} of \"{}\": {} of {} already fulfilled",
                        qty, item.title, item.fulfilled_quantity, item.quantity
                    )));
                }
            }

            let location = inventory.default_location(&order.store_id)?;
            let stock_lines: Vec<StockLine> = order
                .items
                .iter()
                .filter_map(|item| {
                    let qty = wanted.get(&item.id).copied().unwrap_or(0);
                    (qty > 0).then(|| StockLine {
                        variant_id:  item.variant_id.clone(),
                        location_id: location.id.clone(),
                        quantity:    qty,
                    })
                })
                .collect();
            if stock_lines.is_empty() {
                return Err(CommerceError::ValidationError(
                    "nothing to fulfill: all requested quantities are zero".to_string(),
                ));
            }
            inventory.fulfill_all(&stock_lines, order.id.0.clone())?;

            // Inventory committed; order mutation cannot fail past here.
            let mut lines = Vec::new();
            for item in &mut order.items {
                if let Some(qty) = wanted.get(&item.id) {
                    if *qty > 0 {
                        item.fulfilled_quantity += qty;
                        lines.push(FulfillmentLine {
                            order_item_id: item.id.clone(),
                            quantity:      *qty,
                        });
                    }
                }
            }

            let fulfillment =
                Fulfillment::new(lines, carrier.clone(), tracking_number.clone(), fulfilled_by.clone());
            let fulfillment_id = fulfillment.id.clone();
            order.fulfillments.push(fulfillment);

            order.fulfillment_status = if order.is_fully_fulfilled() {
                order.fulfilled_at = Some(current_timestamp());
                FulfillmentStatus::Fulfilled
            } else {
                FulfillmentStatus::Partial
            };
            order.status =
                derive_status(order.status, order.payment_status, order.fulfillment_status);
            order.add_event(
                OrderEventType::Fulfilled,
                format!("Fulfillment {} created", fulfillment_id),
                fulfilled_by.clone(),
            );
            info!(order = %order.id, fulfillment = %fulfillment_id, "order fulfilled");
            Ok(order.clone())
        })
    }
}
