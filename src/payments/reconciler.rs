//! Webhook reconciler: turns verified provider events into order state.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use super::events::{WebhookEvent, EVENT_CHECKOUT_COMPLETED, EVENT_REFUND_UPDATED};
use super::ledger::{OrderPayment, SellerLedger};
use super::provider::{
    verify_signature, CheckoutPurpose, PaymentIntent, PaymentProvider, StoreCharge,
    TransferRequest,
};
use crate::errors::CommerceError;
use crate::implementation::inventory::InventoryService;
use crate::implementation::order_management::types::basic_types::{DraftOrderId, OrderId};
use crate::implementation::order_management::OrderService;
use crate::types::CommerceConfig;

/// What a webhook delivery amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed state.
    Processed,
    /// The event (or its payment) was seen before; nothing changed.
    AlreadyProcessed,
    /// An event type this consumer does not care about.
    Ignored,
}

/// Consumes provider webhooks and reconciles payments onto orders.
///
/// Two layers of idempotency: a processed event-ID set catches exact
/// redeliveries, and a per-order provider-payment-ID check catches the
/// same payment arriving under a different event ID.
pub struct PaymentReconciler {
    config:           CommerceConfig,
    provider:         Arc<dyn PaymentProvider>,
    orders:           Arc<OrderService>,
    inventory:        Arc<InventoryService>,
    ledger:           SellerLedger,
    processed_events: Arc<Mutex<HashSet<String>>>,
}

impl PaymentReconciler {
    /// Creates a reconciler over the shared services.
    #[must_use]
    pub fn new(
        config: CommerceConfig, provider: Arc<dyn PaymentProvider>, orders: Arc<OrderService>,
        inventory: Arc<InventoryService>, ledger: SellerLedger,
    ) -> Self {
        Self {
            config,
            provider,
            orders,
            inventory,
            ledger,
            processed_events: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Handles one webhook delivery.
    ///
    /// Signature verification happens before anything else; a bad
    /// signature is the only error callers should answer with a non-2xx
    /// response, everything else is safe to acknowledge and let the
    /// provider retry or drop.
    pub fn handle_webhook(
        &self, signature: &str, body: &[u8],
    ) -> Result<WebhookOutcome, CommerceError> {
        verify_signature(&self.config.webhook_secret, body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| CommerceError::ValidationError(format!("malformed webhook body: {e}")))?;

        {
            let processed =
                self.processed_events.lock().map_err(|_| CommerceError::LockError)?;
            if processed.contains(&event.id) {
                info!(event = %event.id, "webhook event already processed");
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
        }

        let outcome = match event.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => {
                let session_id = event.object_id().ok_or_else(|| {
                    CommerceError::ValidationError(
                        "checkout event carries no session id".to_string(),
                    )
                })?;
                self.handle_checkout_completed(session_id)?
            },
            EVENT_REFUND_UPDATED => {
                let intent_id = event.object_payment_intent().ok_or_else(|| {
                    CommerceError::ValidationError(
                        "refund event carries no payment intent".to_string(),
                    )
                })?;
                self.handle_refund_updated(intent_id)?
            },
            other => {
                info!(event = %event.id, event_type = other, "webhook event type ignored");
                WebhookOutcome::Ignored
            },
        };

        let mut processed =
            self.processed_events.lock().map_err(|_| CommerceError::LockError)?;
        processed.insert(event.id);
        Ok(outcome)
    }

    /// Seller ledger view, for the dashboard.
    #[must_use]
    pub fn ledger(&self) -> &SellerLedger {
        &self.ledger
    }

    // ========================================================================
    // CHECKOUT COMPLETION
    // ========================================================================

    fn handle_checkout_completed(
        &self, session_id: &str,
    ) -> Result<WebhookOutcome, CommerceError> {
        // Amounts and charge ids come from the provider, never the
        // webhook payload.
        let session = self.provider.retrieve_checkout_session(session_id)?;
        if !session.currency.eq_ignore_ascii_case(&self.config.currency) {
            return Err(CommerceError::ValidationError(format!(
                "session {} settles in {}, expected {}",
                session.id, session.currency, self.config.currency
            )));
        }
        let intent = self.provider.retrieve_payment_intent(&session.payment_intent_id)?;

        match &session.purpose {
            CheckoutPurpose::Order { order_id } => {
                let order_id = OrderId::new(order_id.clone());
                let order = self.orders.get_order(&order_id)?;
                if order.has_provider_payment(&intent.id) {
                    info!(order = %order_id, intent = %intent.id, "payment already recorded");
                    return Ok(WebhookOutcome::AlreadyProcessed);
                }
                let payment =
                    OrderPayment::from_provider(intent.id.clone(), intent.amount_received, 0);
                self.orders.mark_paid(&order_id, payment)?;
                info!(order = %order_id, intent = %intent.id, "order payment reconciled");
                Ok(WebhookOutcome::Processed)
            },
            CheckoutPurpose::DraftInvoice { draft_id } => {
                let draft_id = DraftOrderId::new(draft_id.clone());
                let draft = self.orders.get_draft(&draft_id)?;
                if draft.completed {
                    info!(draft = %draft_id, "draft already completed");
                    return Ok(WebhookOutcome::AlreadyProcessed);
                }
                let order =
                    self.orders.complete_draft_order(&draft_id, false, &self.inventory)?;
                let payment =
                    OrderPayment::from_provider(intent.id.clone(), intent.amount_received, 0);
                self.orders.mark_paid(&order.id, payment)?;
                info!(draft = %draft_id, order = %order.id, "invoice payment reconciled");
                Ok(WebhookOutcome::Processed)
            },
            CheckoutPurpose::MultiStore { breakdown } => {
                self.reconcile_multi_store(breakdown, &intent)
            },
        }
    }

    /// Multi-store settlement: per-store fee, transfer, payment rows,
    /// ledger credit. One store's transfer failure never blocks the
    /// others.
    fn reconcile_multi_store(
        &self, breakdown: &[StoreCharge], intent: &PaymentIntent,
    ) -> Result<WebhookOutcome, CommerceError> {
        let mut any_processed = false;
        let mut any_pending = false;

        for charge in breakdown {
            let order_ids: Vec<OrderId> =
                charge.order_ids.iter().map(|id| OrderId::new(id.clone())).collect();

            // Same payment already landed on this store's orders.
            let seen = order_ids.iter().any(|id| {
                self.orders
                    .get_order(id)
                    .map(|o| o.has_provider_payment(&intent.id))
                    .unwrap_or(false)
            });
            if seen {
                info!(store = %charge.store_id, intent = %intent.id, "store share already reconciled");
                continue;
            }

            let fee = charge.amount * u64::from(self.config.platform_fee_bps) / 10_000;
            let net = charge.amount.saturating_sub(fee);

            let transferred = match &intent.latest_charge_id {
                Some(charge_id) => {
                    let request = TransferRequest {
                        destination_account: charge.connected_account.clone(),
                        amount:              net,
                        source_charge_id:    charge_id.clone(),
                        description:         format!("Marketplace settlement, store {}", charge.store_id),
                    };
                    match self.provider.create_transfer(&request) {
                        Ok(transfer) => {
                            info!(store = %charge.store_id, transfer = %transfer.id, amount = net, "transfer created");
                            true
                        },
                        Err(e) => {
                            warn!(store = %charge.store_id, error = %e, "transfer failed, funds stay held");
                            false
                        },
                    }
                },
                None => {
                    warn!(store = %charge.store_id, intent = %intent.id, "intent has no charge to transfer from");
                    false
                },
            };

            // Orders are marked paid either way; the buyer's money is
            // captured even when the seller transfer has to be retried.
            for order_id in &order_ids {
                let order = match self.orders.get_order(order_id) {
                    Ok(order) => order,
                    Err(e) => {
                        warn!(order = %order_id, error = %e, "order missing during settlement");
                        continue;
                    },
                };
                let order_total = order.totals.total_amount;
                let order_fee =
                    order_total * u64::from(self.config.platform_fee_bps) / 10_000;
                let mut payment =
                    OrderPayment::from_provider(intent.id.clone(), order_total, order_fee);
                if transferred {
                    payment.mark_transferred();
                }
                let net_amount = payment.net_amount;
                if let Err(e) = self.orders.mark_paid(order_id, payment) {
                    warn!(order = %order_id, error = %e, "payment insert failed during settlement");
                    continue;
                }
                if transferred {
                    let store = order.store_id.clone();
                    if let Err(e) = self.ledger.record_credit(
                        &store,
                        net_amount,
                        Some(order_id.clone()),
                        format!("Settlement for order {}", order.number),
                    ) {
                        warn!(store = %store, error = %e, "ledger credit failed");
                    }
                }
                any_processed = true;
            }
            if !transferred {
                any_pending = true;
            }
        }

        if any_pending {
            info!("settlement finished with held funds pending transfer retry");
        }
        if any_processed {
            Ok(WebhookOutcome::Processed)
        } else {
            Ok(WebhookOutcome::AlreadyProcessed)
        }
    }

    // ========================================================================
    // REFUNDS
    // ========================================================================

    fn handle_refund_updated(&self, intent_id: &str) -> Result<WebhookOutcome, CommerceError> {
        // Refunded-to-date is the sum of settled refunds on the intent;
        // pending and failed refunds do not count.
        let refunds = self.provider.list_refunds(intent_id)?;
        let total_refunded: u64 =
            refunds.iter().filter(|r| r.succeeded).map(|r| r.amount).sum();

        // The intent may have paid several orders (multi-store split);
        // the service spreads the total across all of them.
        let updated = self.orders.record_refund_for_provider_payment(intent_id, total_refunded)?;
        for order in &updated {
            info!(
                order = %order.id,
                intent = intent_id,
                refunded = order.totals.refunded_amount,
                "refund reconciled"
            );
        }
        Ok(WebhookOutcome::Processed)
    }
}
