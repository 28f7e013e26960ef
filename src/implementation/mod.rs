//! Domain service implementations and the composition root.

pub mod fulfillment;
pub mod inventory;
pub mod order_management;

use std::sync::Arc;

use crate::implementation::fulfillment::FulfillmentProcessor;
use crate::implementation::inventory::InventoryService;
use crate::implementation::order_management::{NotificationSender, OrderService};
use crate::payments::ledger::SellerLedger;
use crate::payments::provider::PaymentProvider;
use crate::payments::reconciler::PaymentReconciler;
use crate::types::CommerceConfig;

/// Composition root: one explicitly constructed object owning every
/// service and collaborator. No lazily-initialized globals; callers
/// build a core at startup and hand it to the action layer.
pub struct CommerceCore {
    /// Runtime configuration.
    pub config:      CommerceConfig,
    /// Inventory ledger.
    pub inventory:   Arc<InventoryService>,
    /// Orders and drafts.
    pub orders:      Arc<OrderService>,
    /// Fulfillment processing.
    pub fulfillment: FulfillmentProcessor,
    /// Webhook reconciliation.
    pub reconciler:  PaymentReconciler,
    /// Invoice delivery.
    pub notifier:    Arc<dyn NotificationSender>,
}

impl CommerceCore {
    /// Wires the core from its injected collaborators.
    #[must_use]
    pub fn new(
        config: CommerceConfig, provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let inventory = Arc::new(InventoryService::new());
        let orders = Arc::new(OrderService::new());
        let fulfillment =
            FulfillmentProcessor::new(Arc::clone(&orders), Arc::clone(&inventory));
        let reconciler = PaymentReconciler::new(
            config.clone(),
            provider,
            Arc::clone(&orders),
            Arc::clone(&inventory),
            SellerLedger::new(),
        );
        Self { config, inventory, orders, fulfillment, reconciler, notifier }
    }
}
