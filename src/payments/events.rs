//! Webhook event envelope.
//!
//! Only the envelope is modeled; the object inside `data` is kept as
//! raw JSON because the reconciler only pulls an ID out of it and
//! re-fetches the authoritative state from the provider.

use serde::Deserialize;

/// Event type for a completed checkout session.
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Event type for a created or updated refund.
pub const EVENT_REFUND_UPDATED: &str = "refund.updated";

/// Provider webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider event ID, used for delivery deduplication.
    pub id:         String,
    /// Event type string.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data:       WebhookEventData,
}

/// The `data` wrapper around the event object.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The provider object the event describes, kept raw.
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The `id` field of the event object, if present.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }

    /// The `payment_intent` field of the event object, if present.
    #[must_use]
    pub fn object_payment_intent(&self) -> Option<&str> {
        self.data.object.get("payment_intent").and_then(|v| v.as_str())
    }
}
