//! Endpoint-facing wrappers around the core services.
//!
//! Everything here returns [`ActionResponse`], applying the error
//! surfacing policy: validation and stock errors verbatim, internal
//! errors logged and replaced with a generic message. Store-scoped
//! actions check the caller's scope before touching anything.

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::{ActionResponse, CommerceError};
use crate::implementation::inventory::{
    CascadeOutcome, InventoryAdjustment, InventoryLevel, InventoryLocation, ItemId, LevelFilter,
    LocationId, Page, VariantId,
};
use crate::implementation::order_management::types::basic_types::{DraftOrderId, OrderId};
use crate::implementation::order_management::types::draft::DraftInvoice;
use crate::implementation::order_management::types::order::Order;
use crate::implementation::order_management::{GuestOrderOutcome, GuestOrderRequest, OrderFilter};
use crate::implementation::fulfillment::FulfillmentRequestLine;
use crate::implementation::CommerceCore;
use crate::types::common::StoreId;

/// Caller identity, injected per call by the session layer.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Stable user ID.
    pub user_id:  String,
    /// Platform admin, unrestricted by store scope.
    pub is_admin: bool,
    /// Store the caller operates, if any.
    pub store_id: Option<StoreId>,
}

impl AuthContext {
    /// Whether this caller may act on a store's data.
    #[must_use]
    pub fn can_access(&self, store: &StoreId) -> bool {
        self.is_admin || self.store_id.as_ref() == Some(store)
    }
}

/// Webhook endpoint result. Only signature failures answer non-2xx;
/// everything else is acknowledged so the provider does not retry
/// deliveries we have already decided about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    /// HTTP-style status code.
    pub status:   u16,
    /// Whether the event was accepted.
    pub received: bool,
}

/// Action facade over a [`CommerceCore`].
pub struct CommerceActions {
    core: Arc<CommerceCore>,
}

impl CommerceActions {
    /// Wraps a core.
    #[must_use]
    pub fn new(core: Arc<CommerceCore>) -> Self {
        Self { core }
    }

    // ========================================================================
    // INVENTORY
    // ========================================================================

    /// Lists inventory levels for a store, filtered and paginated.
    pub fn list_levels(
        &self, auth: &AuthContext, store: &StoreId, filter: LevelFilter, page: Page,
    ) -> ActionResponse<Vec<InventoryLevel>> {
        if let Err(e) = self.authorize(auth, store) {
            return ActionResponse::err(&e);
        }
        // Scope is applied server-side regardless of what the filter says.
        let filter = filter.store(store.clone());
        self.core.inventory.list_levels(&filter, page).into()
    }

    /// Lists a store's active locations.
    pub fn list_locations(
        &self, auth: &AuthContext, store: &StoreId,
    ) -> ActionResponse<Vec<InventoryLocation>> {
        if let Err(e) = self.authorize(auth, store) {
            return ActionResponse::err(&e);
        }
        self.core.inventory.list_locations(store).into()
    }

    /// Manually corrects a level's available quantity.
    pub fn adjust_quantity(
        &self, auth: &AuthContext, store: &StoreId, variant: &VariantId, location: &LocationId,
        new_available: i64, reason: &str,
    ) -> ActionResponse<()> {
        if let Err(e) = self.authorize_location(auth, store, location) {
            return ActionResponse::err(&e);
        }
        self.core
            .inventory
            .set_available(variant, location, new_available, reason, Some(auth.user_id.clone()))
            .into()
    }

    /// Updates an item's unit cost.
    pub fn adjust_cost(
        &self, auth: &AuthContext, store: &StoreId, item: &ItemId, cost_amount: u64,
    ) -> ActionResponse<()> {
        if let Err(e) = self.authorize(auth, store) {
            return ActionResponse::err(&e);
        }
        self.core.inventory.update_item_cost(item, cost_amount).into()
    }

    /// Sets the incoming (on order) quantity for a level.
    pub fn adjust_incoming(
        &self, auth: &AuthContext, store: &StoreId, variant: &VariantId, location: &LocationId,
        incoming: i64, reason: &str,
    ) -> ActionResponse<()> {
        if let Err(e) = self.authorize_location(auth, store, location) {
            return ActionResponse::err(&e);
        }
        self.core
            .inventory
            .set_incoming(variant, location, incoming, reason, Some(auth.user_id.clone()))
            .into()
    }

    /// Deletes a level, reporting what the deletion cascaded to.
    pub fn delete_level(
        &self, auth: &AuthContext, store: &StoreId, item: &ItemId, location: &LocationId,
    ) -> ActionResponse<CascadeOutcome> {
        if let Err(e) = self.authorize_location(auth, store, location) {
            return ActionResponse::err(&e);
        }
        self.core.inventory.delete_level(item, location).into()
    }

    /// Adjustment history for an item, newest first.
    pub fn adjustment_history(
        &self, auth: &AuthContext, store: &StoreId, item: &ItemId, limit: Option<usize>,
    ) -> ActionResponse<Vec<InventoryAdjustment>> {
        if let Err(e) = self.authorize(auth, store) {
            return ActionResponse::err(&e);
        }
        self.core.inventory.adjustment_history(item, limit).into()
    }

    // ========================================================================
    // DRAFTS & ORDERS
    // ========================================================================

    /// Sends (or re-sends) a draft's payment-link invoice.
    pub fn send_invoice(
        &self, auth: &AuthContext, draft_id: &DraftOrderId,
    ) -> ActionResponse<DraftInvoice> {
        let draft = match self.core.orders.get_draft(draft_id) {
            Ok(draft) => draft,
            Err(e) => return ActionResponse::err(&e),
        };
        if let Err(e) = self.authorize(auth, &draft.store_id) {
            return ActionResponse::err(&e);
        }
        self.core
            .orders
            .send_invoice(draft_id, self.core.notifier.as_ref(), self.core.config.invoice_ttl_secs)
            .into()
    }

    /// Promotes a draft into an order.
    pub fn complete_draft(
        &self, auth: &AuthContext, draft_id: &DraftOrderId, mark_as_paid: bool,
    ) -> ActionResponse<Order> {
        let draft = match self.core.orders.get_draft(draft_id) {
            Ok(draft) => draft,
            Err(e) => return ActionResponse::err(&e),
        };
        if let Err(e) = self.authorize(auth, &draft.store_id) {
            return ActionResponse::err(&e);
        }
        self.core
            .orders
            .complete_draft_order(draft_id, mark_as_paid, &self.core.inventory)
            .into()
    }

    /// Guest checkout. Unauthenticated by design.
    pub fn create_guest_order(
        &self, request: &GuestOrderRequest,
    ) -> ActionResponse<GuestOrderOutcome> {
        self.core.orders.create_guest_order(request, &self.core.inventory).into()
    }

    /// Searches a store's orders.
    pub fn search_orders(
        &self, auth: &AuthContext, store: &StoreId, filter: OrderFilter,
    ) -> ActionResponse<Vec<Order>> {
        if let Err(e) = self.authorize(auth, store) {
            return ActionResponse::err(&e);
        }
        let filter = filter.store(store.clone());
        self.core.orders.search_orders(&filter).into()
    }

    /// Fulfills requested quantities on an order.
    pub fn fulfill_order(
        &self, auth: &AuthContext, order_id: &OrderId, lines: &[FulfillmentRequestLine],
        carrier: Option<String>, tracking_number: Option<String>,
    ) -> ActionResponse<Order> {
        let order = match self.core.orders.get_order(order_id) {
            Ok(order) => order,
            Err(e) => return ActionResponse::err(&e),
        };
        if let Err(e) = self.authorize(auth, &order.store_id) {
            return ActionResponse::err(&e);
        }
        self.core
            .fulfillment
            .fulfill_order(order_id, lines, carrier, tracking_number, Some(auth.user_id.clone()))
            .into()
    }

    // ========================================================================
    // WEBHOOKS
    // ========================================================================

    /// Webhook endpoint. Maps reconciler results onto response codes.
    pub fn handle_webhook(&self, signature: &str, body: &[u8]) -> WebhookResponse {
        match self.core.reconciler.handle_webhook(signature, body) {
            Ok(outcome) => {
                info!(?outcome, "webhook handled");
                WebhookResponse { status: 200, received: true }
            },
            Err(CommerceError::InvalidSignature) => {
                WebhookResponse { status: 400, received: false }
            },
            Err(e) => {
                // Acknowledged anyway; the failure is ours to resolve,
                // not the provider's to redeliver forever.
                error!(error = %e, "webhook processing failed");
                WebhookResponse { status: 200, received: true }
            },
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn authorize(&self, auth: &AuthContext, store: &StoreId) -> Result<(), CommerceError> {
        if auth.can_access(store) {
            Ok(())
        } else {
            Err(CommerceError::Unauthorized)
        }
    }

    /// Store scope plus location ownership: the location must belong to
    /// the store the caller claims to act on.
    fn authorize_location(
        &self, auth: &AuthContext, store: &StoreId, location: &LocationId,
    ) -> Result<(), CommerceError> {
        self.authorize(auth, store)?;
        let owned = self.core.inventory.get_location(location)?;
        if &owned.store_id != store {
            return Err(CommerceError::LocationNotFound(location.0.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_access_any_store() {
        let auth = AuthContext {
            user_id:  "user_1".to_string(),
            is_admin: true,
            store_id: None,
        };
        assert!(auth.can_access(&StoreId::new("store_a")));
    }

    #[test]
    fn seller_is_scoped_to_their_store() {
        let auth = AuthContext {
            user_id:  "user_1".to_string(),
            is_admin: false,
            store_id: Some(StoreId::new("store_a")),
        };
        assert!(auth.can_access(&StoreId::new("store_a")));
        assert!(!auth.can_access(&StoreId::new("store_b")));
    }
}
