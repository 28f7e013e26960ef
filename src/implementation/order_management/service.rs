//! Order service implementation.
//!
//! Multi-step operations hold the relevant aggregate lock for their full
//! duration and take inventory locks inside it, so two concurrent
//! promotions of the same draft serialize instead of racing. Lock order
//! is always drafts -> inventory -> orders; no code path takes them the
//! other way around.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::Deserialize;
use tracing::{info, warn};

use super::status::{aggregate_payment_status, derive_status};
use super::types::basic_types::{
    DraftOrderId, FulfillmentStatus, OrderId, OrderStatus, PaymentStatus, WorkflowStatus,
};
use super::types::draft::{DraftInvoice, DraftOrder};
use super::types::items::{DiscountKind, DraftOrderItem, OrderDiscount, OrderItem};
use super::types::order::{Order, OrderEventType, OrderTotals};
use crate::errors::CommerceError;
use crate::implementation::inventory::{InventoryService, StockLine, VariantId};
use crate::payments::ledger::OrderPayment;
use crate::types::common::{current_timestamp, Address, Currency, CustomerId, StoreId};

// ============================================================================
// COLLABORATOR CONTRACTS
// ============================================================================

/// Invoice/notification delivery. Fire-and-forget: failures are logged
/// and never block order operations.
pub trait NotificationSender: Send + Sync {
    /// Sends the payment-link invoice for a draft.
    fn send_invoice(&self, draft: &DraftOrder, payment_link_token: &str) -> Result<(), String>;
}

// ============================================================================
// INPUTS
// ============================================================================

/// One line of a draft order input.
#[derive(Debug, Clone)]
pub struct DraftLineInput {
    /// Variant to sell.
    pub variant_id:        VariantId,
    /// Listing reference.
    pub listing_id:        Option<String>,
    /// Title snapshot.
    pub title:             String,
    /// SKU snapshot.
    pub sku:               Option<String>,
    /// Quantity.
    pub quantity:          u32,
    /// Unit price in minor units. Trusted at draft time; the catalog is
    /// not re-consulted.
    pub unit_price_amount: u64,
    /// Line-level discount in minor units.
    pub discount_amount:   u64,
}

/// Order-level discount input.
#[derive(Debug, Clone)]
pub struct DiscountInput {
    /// Discount code.
    pub code:  String,
    /// Discount kind.
    pub kind:  DiscountKind,
    /// Raw value (basis points or minor units, per kind).
    pub value: u64,
}

/// Input for creating or updating a draft order.
#[derive(Debug, Clone)]
pub struct DraftOrderInput {
    /// Owning store.
    pub store_id:         StoreId,
    /// Customer email; the customer is resolved or created by
    /// (store, email).
    pub customer_email:   String,
    /// Currency.
    pub currency:         Currency,
    /// Line items.
    pub lines:            Vec<DraftLineInput>,
    /// Order-level discount.
    pub discount:         Option<DiscountInput>,
    /// Shipping in minor units.
    pub shipping_amount:  u64,
    /// Tax in minor units.
    pub tax_amount:       u64,
    /// Shipping address snapshot.
    pub shipping_address: Address,
    /// Billing address snapshot.
    pub billing_address:  Option<Address>,
}

/// One line of a guest checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestOrderLine {
    /// Variant to sell.
    pub variant_id:        String,
    /// Selling store (a single cart can span multiple stores).
    pub store_id:          String,
    /// Title snapshot.
    pub title:             String,
    /// SKU snapshot.
    pub sku:               Option<String>,
    /// Quantity.
    pub quantity:          u32,
    /// Unit price in minor units.
    pub unit_price_amount: u64,
}

/// Guest checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestOrderRequest {
    /// Customer email.
    pub customer_email:   String,
    /// Currency code.
    pub currency:         String,
    /// Line items, possibly spanning multiple stores.
    pub lines:            Vec<GuestOrderLine>,
    /// Cart-level discount in minor units, pro-rated across stores.
    pub discount_amount:  u64,
    /// Cart-level shipping in minor units, pro-rated across stores.
    pub shipping_amount:  u64,
    /// Cart-level tax in minor units, pro-rated across stores.
    pub tax_amount:       u64,
    /// Shipping address.
    pub shipping_address: Address,
    /// Billing address.
    pub billing_address:  Option<Address>,
}

/// Result of a guest checkout: one order per store.
#[derive(Debug, Clone)]
pub struct GuestOrderOutcome {
    /// All created orders, in store grouping order.
    pub order_ids:        Vec<OrderId>,
    /// First created order, kept for backward compatibility with
    /// single-store callers.
    pub primary_order_id: OrderId,
}

/// Typed order search filter, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    store:              Option<StoreId>,
    status:             Option<OrderStatus>,
    payment_status:     Option<PaymentStatus>,
    fulfillment_status: Option<FulfillmentStatus>,
    created_from:       Option<u64>,
    created_to:         Option<u64>,
}

impl OrderFilter {
    /// Empty filter matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one store.
    #[must_use]
    pub fn store(mut self, store: StoreId) -> Self {
        self.store = Some(store);
        self
    }

    /// Restricts to one order status.
    #[must_use]
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one payment status.
    #[must_use]
    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    /// Restricts to one fulfillment status.
    #[must_use]
    pub fn fulfillment_status(mut self, status: FulfillmentStatus) -> Self {
        self.fulfillment_status = Some(status);
        self
    }

    /// Restricts to orders placed at or after this timestamp.
    #[must_use]
    pub fn created_from(mut self, ts: u64) -> Self {
        self.created_from = Some(ts);
        self
    }

    /// Restricts to orders placed at or before this timestamp.
    #[must_use]
    pub fn created_to(mut self, ts: u64) -> Self {
        self.created_to = Some(ts);
        self
    }

    fn matches(&self, order: &Order) -> bool {
        if let Some(store) = &self.store {
            if &order.store_id != store {
                return false;
            }
        }
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(status) = self.payment_status {
            if order.payment_status != status {
                return false;
            }
        }
        if let Some(status) = self.fulfillment_status {
            if order.fulfillment_status != status {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if order.placed_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if order.placed_at > to {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Order and draft-order service.
#[derive(Debug)]
pub struct OrderService {
    orders:        Arc<Mutex<HashMap<OrderId, Order>>>,
    drafts:        Arc<Mutex<HashMap<DraftOrderId, DraftOrder>>>,
    customers:     Arc<Mutex<HashMap<(StoreId, String), CustomerId>>>,
    order_counter: Arc<Mutex<u64>>,
    draft_counter: Arc<Mutex<u64>>,
}

impl OrderService {
    /// Creates a new order service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders:        Arc::new(Mutex::new(HashMap::new())),
            drafts:        Arc::new(Mutex::new(HashMap::new())),
            customers:     Arc::new(Mutex::new(HashMap::new())),
            order_counter: Arc::new(Mutex::new(1000)),
            draft_counter: Arc::new(Mutex::new(1000)),
        }
    }

    // ========================================================================
    // DRAFT ORDERS
    // ========================================================================

    /// Creates a draft order. No inventory is touched.
    pub fn create_draft_order(
        &self, input: DraftOrderInput,
    ) -> Result<DraftOrder, CommerceError> {
        Self::validate_draft_input(&input)?;

        let customer_id =
            self.resolve_or_create_customer(&input.store_id, &input.customer_email)?;
        let (items, discounts, totals) = Self::build_draft_lines(&input);

        let now = current_timestamp();
        let draft = DraftOrder {
            id: DraftOrderId::generate(),
            number: format!("D{}", self.next_draft_number()?),
            store_id: input.store_id,
            customer_id,
            customer_email: input.customer_email,
            currency: input.currency,
            totals,
            items,
            discounts,
            shipping_address: input.shipping_address,
            billing_address: input.billing_address,
            completed: false,
            converted_to_order: None,
            invoice: DraftInvoice::default(),
            created_at: now,
            updated_at: now,
        };

        let mut drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        drafts.insert(draft.id.clone(), draft.clone());
        info!(draft = %draft.id, number = %draft.number, "draft order created");
        Ok(draft)
    }

    /// Replaces a draft's lines, totals, and addresses. Fails on
    /// completed drafts.
    pub fn update_draft_order(
        &self, draft_id: &DraftOrderId, input: DraftOrderInput,
    ) -> Result<DraftOrder, CommerceError> {
        Self::validate_draft_input(&input)?;
        let customer_id =
            self.resolve_or_create_customer(&input.store_id, &input.customer_email)?;
        let (items, discounts, totals) = Self::build_draft_lines(&input);

        let mut drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        let draft = drafts
            .get_mut(draft_id)
            .ok_or_else(|| CommerceError::DraftOrderNotFound(draft_id.0.clone()))?;
        if draft.completed {
            return Err(CommerceError::Conflict(format!(
                "draft {} is completed and can no longer be edited",
                draft_id
            )));
        }

        draft.customer_id = customer_id;
        draft.customer_email = input.customer_email;
        draft.currency = input.currency;
        draft.items = items;
        draft.discounts = discounts;
        draft.totals = totals;
        draft.shipping_address = input.shipping_address;
        draft.billing_address = input.billing_address;
        draft.touch();
        Ok(draft.clone())
    }

    /// Deletes an uncompleted draft.
    pub fn delete_draft_order(&self, draft_id: &DraftOrderId) -> Result<(), CommerceError> {
        let mut drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        let draft = drafts
            .get(draft_id)
            .ok_or_else(|| CommerceError::DraftOrderNotFound(draft_id.0.clone()))?;
        if draft.completed {
            return Err(CommerceError::Conflict(format!(
                "draft {} is completed and cannot be deleted",
                draft_id
            )));
        }
        drafts.remove(draft_id);
        Ok(())
    }

    /// Sends (or re-sends) the payment-link invoice for a draft.
    ///
    /// Refreshes the token if missing or expired, bumps the send count,
    /// and hands off to the notifier. Notifier failures are logged and
    /// swallowed; the metadata update still commits.
    pub fn send_invoice(
        &self, draft_id: &DraftOrderId, notifier: &dyn NotificationSender, ttl_secs: u64,
    ) -> Result<DraftInvoice, CommerceError> {
        let mut drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        let draft = drafts
            .get_mut(draft_id)
            .ok_or_else(|| CommerceError::DraftOrderNotFound(draft_id.0.clone()))?;
        if draft.completed {
            return Err(CommerceError::Conflict(format!(
                "draft {} is completed; nothing left to invoice",
                draft_id
            )));
        }

        let now = current_timestamp();
        if !draft.invoice.is_token_valid(now) {
            draft.invoice.token = Some(format!("inv_{}", uuid::Uuid::new_v4()));
            draft.invoice.expires_at = Some(now + ttl_secs);
        }
        draft.invoice.send_count += 1;
        draft.invoice.last_sent_at = Some(now);
        draft.touch();

        let token = draft.invoice.token.clone().unwrap_or_default();
        if let Err(e) = notifier.send_invoice(draft, &token) {
            warn!(draft = %draft_id, error = %e, "invoice delivery failed");
        }
        Ok(draft.invoice.clone())
    }

    /// Promotes a draft into an order.
    ///
    /// This is the first point inventory is touched for the sale. The
    /// drafts lock is held for the whole promotion, so a second
    /// concurrent call on the same draft fails the completed check
    /// instead of double-reserving. A reservation failure aborts with
    /// the draft untouched.
    pub fn complete_draft_order(
        &self, draft_id: &DraftOrderId, mark_as_paid: bool, inventory: &InventoryService,
    ) -> Result<Order, CommerceError> {
        let mut drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        let draft = drafts
            .get_mut(draft_id)
            .ok_or_else(|| CommerceError::DraftOrderNotFound(draft_id.0.clone()))?;
        if draft.completed {
            return Err(CommerceError::Conflict(format!(
                "draft {} is already completed",
                draft_id
            )));
        }

        let location = inventory.default_location(&draft.store_id)?;
        let order_id = OrderId::generate();
        let number = format!("#{}", self.next_order_number()?);

        let lines: Vec<StockLine> = draft
            .items
            .iter()
            .map(|item| StockLine {
                variant_id:  item.variant_id.clone(),
                location_id: location.id.clone(),
                quantity:    item.quantity,
            })
            .collect();
        inventory.reserve_all(&lines, order_id.0.clone())?;

        // Reservation held; everything past this point cannot fail.
        let now = current_timestamp();
        let items: Vec<OrderItem> = draft.items.iter().map(DraftOrderItem::to_order_item).collect();
        let mut order = Order {
            id: order_id.clone(),
            number,
            store_id: draft.store_id.clone(),
            customer_id: draft.customer_id.clone(),
            customer_email: draft.customer_email.clone(),
            currency: draft.currency.clone(),
            totals: draft.totals.clone(),
            status: OrderStatus::Open,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            workflow_status: WorkflowStatus::Normal,
            shipping_address: draft.shipping_address.clone(),
            billing_address: draft.billing_address.clone(),
            items,
            discounts: draft.discounts.clone(),
            payments: Vec::new(),
            fulfillments: Vec::new(),
            events: Vec::new(),
            draft_id: Some(draft_id.clone()),
            placed_at: now,
            paid_at: None,
            fulfilled_at: None,
            canceled_at: None,
            archived_at: None,
            updated_at: now,
        };
        order.add_event(
            OrderEventType::ConvertedFromDraft,
            format!("Created from draft {}", draft.number),
            None,
        );

        if mark_as_paid {
            let payment = OrderPayment::manual(order.totals.total_amount);
            order.payments.push(payment);
            order.payment_status = PaymentStatus::Paid;
            order.paid_at = Some(now);
            order.status =
                derive_status(order.status, order.payment_status, order.fulfillment_status);
            order.add_event(OrderEventType::Paid, "Marked as paid at completion", None);
        }

        let mut orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
        orders.insert(order.id.clone(), order.clone());
        drop(orders);

        draft.completed = true;
        draft.converted_to_order = Some(order.id.clone());
        draft.touch();
        info!(draft = %draft_id, order = %order.id, "draft order completed");
        Ok(order)
    }

    // ========================================================================
    // GUEST CHECKOUT
    // ========================================================================

    /// Creates orders from a guest checkout, one per store.
    ///
    /// Cart-level discount/shipping/tax are pro-rated across stores by
    /// subtotal share (equal split at zero subtotal); remainder cents go
    /// to the first store so bucket sums always equal the cart totals.
    /// A reservation failure in a later store releases the earlier
    /// stores' reservations, making the request all-or-nothing.
    pub fn create_guest_order(
        &self, request: &GuestOrderRequest, inventory: &InventoryService,
    ) -> Result<GuestOrderOutcome, CommerceError> {
        if request.customer_email.trim().is_empty() {
            return Err(CommerceError::ValidationError("customer email is required".to_string()));
        }
        if request.lines.is_empty() {
            return Err(CommerceError::ValidationError("at least one line item is required".to_string()));
        }
        for line in &request.lines {
            if line.quantity == 0 {
                return Err(CommerceError::ValidationError(format!(
                    "quantity for variant {} must be positive",
                    line.variant_id
                )));
            }
            let variant = VariantId::new(line.variant_id.clone());
            if !inventory.variant_exists(&variant)? {
                return Err(CommerceError::VariantNotFound(line.variant_id.clone()));
            }
        }

        // Group lines by store, preserving first-seen order.
        let mut buckets: Vec<(StoreId, Vec<&GuestOrderLine>)> = Vec::new();
        for line in &request.lines {
            let store = StoreId::new(line.store_id.clone());
            match buckets.iter_mut().find(|(s, _)| *s == store) {
                Some((_, lines)) => lines.push(line),
                None => buckets.push((store, vec![line])),
            }
        }

        let subtotals: Vec<u64> = buckets
            .iter()
            .map(|(_, lines)| {
                lines.iter().map(|l| u64::from(l.quantity) * l.unit_price_amount).sum()
            })
            .collect();
        let discount_split = pro_rate(request.discount_amount, &subtotals);
        let shipping_split = pro_rate(request.shipping_amount, &subtotals);
        let tax_split = pro_rate(request.tax_amount, &subtotals);

        // Reserve store by store, compensating on failure.
        let mut reserved: Vec<(OrderId, Vec<StockLine>)> = Vec::new();
        let mut order_ids: Vec<OrderId> = Vec::new();
        for (store, lines) in &buckets {
            let location = inventory.default_location(store)?;
            let order_id = OrderId::generate();
            let stock_lines: Vec<StockLine> = lines
                .iter()
                .map(|l| StockLine {
                    variant_id:  VariantId::new(l.variant_id.clone()),
                    location_id: location.id.clone(),
                    quantity:    l.quantity,
                })
                .collect();
            if let Err(e) = inventory.reserve_all(&stock_lines, order_id.0.clone()) {
                for (prior_order, prior_lines) in &reserved {
                    for line in prior_lines {
                        if let Err(release_err) = inventory.release(
                            &line.variant_id,
                            &line.location_id,
                            line.quantity,
                            "Guest checkout rolled back",
                            prior_order.0.clone(),
                        ) {
                            warn!(order = %prior_order, error = %release_err, "rollback release failed");
                        }
                    }
                }
                return Err(e);
            }
            reserved.push((order_id.clone(), stock_lines));
            order_ids.push(order_id);
        }

        // Reservations held for every store; create the orders.
        let currency = Currency::new(request.currency.clone());
        let now = current_timestamp();
        let mut orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
        for (index, (store, lines)) in buckets.iter().enumerate() {
            let customer_id = self.resolve_or_create_customer(store, &request.customer_email)?;
            let items: Vec<OrderItem> = lines
                .iter()
                .map(|l| {
                    let subtotal = u64::from(l.quantity) * l.unit_price_amount;
                    OrderItem {
                        id: format!("oi_{}", uuid::Uuid::new_v4()),
                        listing_id: None,
                        variant_id: VariantId::new(l.variant_id.clone()),
                        title: l.title.clone(),
                        sku: l.sku.clone(),
                        quantity: l.quantity,
                        unit_price_amount: l.unit_price_amount,
                        subtotal_amount: subtotal,
                        discount_amount: 0,
                        total_amount: subtotal,
                        fulfilled_quantity: 0,
                    }
                })
                .collect();

            let totals = OrderTotals::compute(
                subtotals[index],
                discount_split[index],
                shipping_split[index],
                tax_split[index],
            );
            let mut order = Order {
                id: order_ids[index].clone(),
                number: format!("#{}", self.next_order_number()?),
                store_id: store.clone(),
                customer_id,
                customer_email: request.customer_email.clone(),
                currency: currency.clone(),
                totals,
                status: OrderStatus::Open,
                payment_status: PaymentStatus::Pending,
                fulfillment_status: FulfillmentStatus::Unfulfilled,
                workflow_status: WorkflowStatus::Normal,
                shipping_address: request.shipping_address.clone(),
                billing_address: request.billing_address.clone(),
                items,
                discounts: Vec::new(),
                payments: Vec::new(),
                fulfillments: Vec::new(),
                events: Vec::new(),
                draft_id: None,
                placed_at: now,
                paid_at: None,
                fulfilled_at: None,
                canceled_at: None,
                archived_at: None,
                updated_at: now,
            };
            order.add_event(OrderEventType::Created, "Guest checkout", None);
            orders.insert(order.id.clone(), order);
        }
        drop(orders);

        let primary_order_id = order_ids[0].clone();
        info!(orders = order_ids.len(), primary = %primary_order_id, "guest checkout created");
        Ok(GuestOrderOutcome { order_ids, primary_order_id })
    }

    // ========================================================================
    // PAYMENT / LIFECYCLE TRANSITIONS
    // ========================================================================

    /// Records a payment and marks the order paid, re-deriving `status`.
    ///
    /// Rejects a payment whose provider payment ID was already recorded,
    /// so webhook redelivery cannot double-credit.
    pub fn mark_paid(
        &self, order_id: &OrderId, payment: OrderPayment,
    ) -> Result<Order, CommerceError> {
        self.with_order_mut(order_id, |order| {
            if let Some(provider_id) = payment.provider_payment_id.as_deref() {
                if order.has_provider_payment(provider_id) {
                    return Err(CommerceError::Conflict(format!(
                        "payment {} already recorded on order {}",
                        provider_id, order.id
                    )));
                }
            }
            let amount = payment.amount;
            order.payments.push(payment);
            order.payment_status = aggregate_payment_status(order);
            if order.paid_at.is_none() {
                order.paid_at = Some(current_timestamp());
            }
            order.status =
                derive_status(order.status, order.payment_status, order.fulfillment_status);
            order.add_event(
                OrderEventType::Paid,
                format!("Payment of {} recorded", crate::types::common::format_amount(amount)),
                None,
            );
            Ok(order.clone())
        })
    }

    /// Writes the provider's refunded-to-date total onto a payment and
    /// recomputes the order's aggregate payment status.
    pub fn record_refund(
        &self, order_id: &OrderId, provider_payment_id: &str, total_refunded: u64,
    ) -> Result<Order, CommerceError> {
        self.with_order_mut(order_id, |order| {
            let payment = order
                .payments
                .iter_mut()
                .find(|p| p.provider_payment_id.as_deref() == Some(provider_payment_id))
                .ok_or_else(|| CommerceError::PaymentNotFound(provider_payment_id.to_string()))?;
            payment.apply_refund_total(total_refunded);

            order.totals.refunded_amount = order.payments_refunded_amount();
            order.payment_status = aggregate_payment_status(order);
            order.status =
                derive_status(order.status, order.payment_status, order.fulfillment_status);
            order.add_event(
                OrderEventType::Refunded,
                format!(
                    "Refunded to date: {}",
                    crate::types::common::format_amount(order.totals.refunded_amount)
                ),
                None,
            );
            Ok(order.clone())
        })
    }

    /// Explicitly cancels an open order, optionally releasing its
    /// unfulfilled reservations back to stock.
    pub fn cancel_order(
        &self, order_id: &OrderId, restock: bool, inventory: &InventoryService,
    ) -> Result<Order, CommerceError> {
        self.with_order_mut(order_id, |order| {
            match order.status {
                OrderStatus::Canceled => {
                    return Err(CommerceError::Conflict(format!(
                        "order {} is already canceled",
                        order.id
                    )));
                },
                OrderStatus::Completed | OrderStatus::Archived => {
                    return Err(CommerceError::Conflict(format!(
                        "order {} is {} and cannot be canceled",
                        order.id,
                        order.status.display_name()
                    )));
                },
                _ => {},
            }

            if restock {
                let location = inventory.default_location(&order.store_id)?;
                for item in &order.items {
                    let remaining = item.remaining_quantity();
                    if remaining > 0 {
                        inventory.release(
                            &item.variant_id,
                            &location.id,
                            remaining,
                            "Order canceled",
                            order.id.0.clone(),
                        )?;
                    }
                }
            }

            order.status = OrderStatus::Canceled;
            order.fulfillment_status = FulfillmentStatus::Canceled;
            order.canceled_at = Some(current_timestamp());
            order.add_event(OrderEventType::Canceled, "Order canceled", None);
            Ok(order.clone())
        })
    }

    /// Archives a completed or canceled order.
    pub fn archive_order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.with_order_mut(order_id, |order| {
            if !matches!(order.status, OrderStatus::Completed | OrderStatus::Canceled) {
                return Err(CommerceError::Conflict(format!(
                    "order {} is {} and cannot be archived",
                    order.id,
                    order.status.display_name()
                )));
            }
            order.status = OrderStatus::Archived;
            order.archived_at = Some(current_timestamp());
            order.add_event(OrderEventType::Archived, "Order archived", None);
            Ok(order.clone())
        })
    }

    /// Sets the operational workflow flag.
    pub fn set_workflow_status(
        &self, order_id: &OrderId, status: WorkflowStatus, user: Option<String>,
    ) -> Result<Order, CommerceError> {
        self.with_order_mut(order_id, |order| {
            let previous = order.workflow_status;
            order.workflow_status = status;
            order.add_event(
                OrderEventType::WorkflowChanged,
                format!(
                    "Workflow changed from {} to {}",
                    previous.display_name(),
                    status.display_name()
                ),
                user.clone(),
            );
            Ok(order.clone())
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Gets an order by ID.
    pub fn get_order(&self, id: &OrderId) -> Result<Order, CommerceError> {
        let orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
        orders.get(id).cloned().ok_or_else(|| CommerceError::OrderNotFound(id.0.clone()))
    }

    /// Gets a draft order by ID.
    pub fn get_draft(&self, id: &DraftOrderId) -> Result<DraftOrder, CommerceError> {
        let drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        drafts.get(id).cloned().ok_or_else(|| CommerceError::DraftOrderNotFound(id.0.clone()))
    }

    /// Finds the uncompleted draft carrying an invoice token.
    pub fn draft_by_invoice_token(&self, token: &str) -> Result<DraftOrder, CommerceError> {
        let drafts = self.drafts.lock().map_err(|_| CommerceError::LockError)?;
        drafts
            .values()
            .find(|d| d.invoice.token.as_deref() == Some(token))
            .cloned()
            .ok_or_else(|| CommerceError::DraftOrderNotFound(token.to_string()))
    }

    /// Writes the provider's refunded-to-date total for a payment intent
    /// across every order carrying it.
    ///
    /// A multi-store intent pays several orders with one capture, so the
    /// intent-level total is pro-rated by each order's captured share
    /// before it is written. Orders are walked in number order so the
    /// remainder cent always lands on the same one.
    pub fn record_refund_for_provider_payment(
        &self, provider_payment_id: &str, total_refunded: u64,
    ) -> Result<Vec<Order>, CommerceError> {
        let targets: Vec<(OrderId, u64)> = {
            let orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
            let mut found: Vec<(String, OrderId, u64)> = orders
                .values()
                .filter_map(|o| {
                    o.payments
                        .iter()
                        .find(|p| p.provider_payment_id.as_deref() == Some(provider_payment_id))
                        .map(|p| (o.number.clone(), o.id.clone(), p.amount))
                })
                .collect();
            found.sort_by(|a, b| a.0.cmp(&b.0));
            found.into_iter().map(|(_, id, amount)| (id, amount)).collect()
        };
        if targets.is_empty() {
            return Err(CommerceError::PaymentNotFound(provider_payment_id.to_string()));
        }

        let weights: Vec<u64> = targets.iter().map(|(_, amount)| *amount).collect();
        let shares = pro_rate(total_refunded, &weights);
        let mut updated = Vec::with_capacity(targets.len());
        for ((order_id, _), share) in targets.iter().zip(shares) {
            updated.push(self.record_refund(order_id, provider_payment_id, share)?);
        }
        Ok(updated)
    }

    /// Searches orders, newest first.
    pub fn search_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, CommerceError> {
        let orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
        let mut matched: Vec<Order> =
            orders.values().filter(|o| filter.matches(o)).cloned().collect();
        matched.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(matched)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Runs a mutation under the orders lock. The closure may call into
    /// the inventory service (lock order: orders -> inventory); an error
    /// from the closure leaves the order untouched only if the closure
    /// failed before mutating, which every caller guarantees by
    /// validating first.
    pub(crate) fn with_order_mut<R>(
        &self, order_id: &OrderId,
        f: impl FnOnce(&mut Order) -> Result<R, CommerceError>,
    ) -> Result<R, CommerceError> {
        let mut orders = self.orders.lock().map_err(|_| CommerceError::LockError)?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.0.clone()))?;
        f(order)
    }

    fn validate_draft_input(input: &DraftOrderInput) -> Result<(), CommerceError> {
        if input.customer_email.trim().is_empty() {
            return Err(CommerceError::ValidationError("customer email is required".to_string()));
        }
        if input.lines.is_empty() {
            return Err(CommerceError::ValidationError("at least one line item is required".to_string()));
        }
        for line in &input.lines {
            if line.quantity == 0 {
                return Err(CommerceError::ValidationError(format!(
                    "quantity for {} must be positive",
                    line.title
                )));
            }
        }
        Ok(())
    }

    fn build_draft_lines(
        input: &DraftOrderInput,
    ) -> (Vec<DraftOrderItem>, Vec<OrderDiscount>, OrderTotals) {
        let items: Vec<DraftOrderItem> = input
            .lines
            .iter()
            .map(|line| {
                let subtotal = u64::from(line.quantity) * line.unit_price_amount;
                DraftOrderItem {
                    id: format!("di_{}", uuid::Uuid::new_v4()),
                    listing_id: line.listing_id.clone(),
                    variant_id: line.variant_id.clone(),
                    title: line.title.clone(),
                    sku: line.sku.clone(),
                    quantity: line.quantity,
                    unit_price_amount: line.unit_price_amount,
                    subtotal_amount: subtotal,
                    discount_amount: line.discount_amount.min(subtotal),
                    total_amount: subtotal.saturating_sub(line.discount_amount),
                }
            })
            .collect();

        let subtotal: u64 = items.iter().map(|i| i.subtotal_amount).sum();
        let line_discounts: u64 = items.iter().map(|i| i.discount_amount).sum();

        let mut discounts = Vec::new();
        let mut order_discount = 0u64;
        if let Some(d) = &input.discount {
            let computed = OrderDiscount::compute_amount(d.kind, d.value, subtotal);
            discounts.push(OrderDiscount::new(d.code.clone(), d.kind, d.value, computed));
            order_discount = computed;
        }

        let totals = OrderTotals::compute(
            subtotal,
            line_discounts + order_discount,
            input.shipping_amount,
            input.tax_amount,
        );
        (items, discounts, totals)
    }

    fn resolve_or_create_customer(
        &self, store: &StoreId, email: &str,
    ) -> Result<CustomerId, CommerceError> {
        let key = (store.clone(), email.trim().to_lowercase());
        let mut customers = self.customers.lock().map_err(|_| CommerceError::LockError)?;
        Ok(customers.entry(key).or_insert_with(CustomerId::generate).clone())
    }

    fn next_order_number(&self) -> Result<u64, CommerceError> {
        let mut counter = self.order_counter.lock().map_err(|_| CommerceError::LockError)?;
        *counter += 1;
        Ok(*counter)
    }

    fn next_draft_number(&self) -> Result<u64, CommerceError> {
        let mut counter = self.draft_counter.lock().map_err(|_| CommerceError::LockError)?;
        *counter += 1;
        Ok(*counter)
    }
}

impl Default for OrderService {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `total` across buckets proportionally to `weights`, flooring
/// each share and assigning the remainder to the first bucket so the
/// shares always sum to `total`. Zero total weight splits equally.
#[must_use]
pub(crate) fn pro_rate(total: u64, weights: &[u64]) -> Vec<u64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weight_sum: u64 = weights.iter().sum();
    let mut shares: Vec<u64> = if weight_sum == 0 {
        let each = total / weights.len() as u64;
        vec![each; weights.len()]
    } else {
        weights.iter().map(|w| total * w / weight_sum).collect()
    };
    let assigned: u64 = shares.iter().sum();
    shares[0] += total - assigned;
    shares
}
