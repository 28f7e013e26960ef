//! Payment provider contract and webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::CommerceError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies an HMAC-SHA256 webhook signature over the raw body.
///
/// The signature is hex-encoded; comparison is constant-time via the
/// MAC verifier. Any malformed signature fails the same way a wrong one
/// does.
pub fn verify_signature(
    secret: &str, body: &[u8], signature_hex: &str,
) -> Result<(), CommerceError> {
    if secret.is_empty() {
        return Err(CommerceError::InternalError(
            "webhook secret is not configured".to_string(),
        ));
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CommerceError::InternalError("webhook secret is unusable".to_string()))?;
    mac.update(body);
    let expected = hex::decode(signature_hex).map_err(|_| CommerceError::InvalidSignature)?;
    mac.verify_slice(&expected).map_err(|_| CommerceError::InvalidSignature)
}

/// Computes the hex signature for a body. Test and tooling helper.
#[must_use]
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// What a checkout session was created to pay for, carried in session
/// metadata.
#[derive(Debug, Clone)]
pub enum CheckoutPurpose {
    /// A single existing order.
    Order {
        /// Order being paid.
        order_id: String,
    },
    /// A draft order paid through its invoice link.
    DraftInvoice {
        /// Draft being paid; completion happens at reconciliation.
        draft_id: String,
    },
    /// A multi-store cart, one charge breakdown entry per store.
    MultiStore {
        /// Per-store split of the session total.
        breakdown: Vec<StoreCharge>,
    },
}

/// One store's share of a multi-store checkout session.
#[derive(Debug, Clone)]
pub struct StoreCharge {
    /// Selling store.
    pub store_id:          String,
    /// Gross amount for this store, in minor units.
    pub amount:            u64,
    /// Orders this charge settles.
    pub order_ids:         Vec<String>,
    /// Seller's connected account to transfer the net to.
    pub connected_account: String,
}

/// A checkout session as re-fetched from the provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Session ID.
    pub id:                String,
    /// Payment intent backing the session.
    pub payment_intent_id: String,
    /// Session total in minor units.
    pub amount_total:      u64,
    /// Currency code.
    pub currency:          String,
    /// What this session pays for.
    pub purpose:           CheckoutPurpose,
}

/// A payment intent as re-fetched from the provider.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Intent ID; recorded as the provider payment ID on orders.
    pub id:               String,
    /// Amount actually captured, in minor units.
    pub amount_received:  u64,
    /// Charge to source transfers from, once captured.
    pub latest_charge_id: Option<String>,
}

/// One refund on a payment intent.
#[derive(Debug, Clone)]
pub struct ProviderRefund {
    /// Refund ID.
    pub id:        String,
    /// Refund amount in minor units.
    pub amount:    u64,
    /// Whether the refund has settled. Pending and failed refunds do
    /// not count toward the refunded total.
    pub succeeded: bool,
}

/// Request to move funds to a seller's connected account.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Destination connected account.
    pub destination_account: String,
    /// Net amount to move, in minor units.
    pub amount:              u64,
    /// Charge the funds come from.
    pub source_charge_id:    String,
    /// Description for the provider dashboard.
    pub description:         String,
}

/// A completed transfer.
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Transfer ID.
    pub id: String,
}

/// Payment gateway contract. The reconciler treats the provider as the
/// source of truth for amounts, charges, and refunds.
pub trait PaymentProvider: Send + Sync {
    /// Fetches a checkout session by ID.
    fn retrieve_checkout_session(&self, session_id: &str)
        -> Result<CheckoutSession, CommerceError>;

    /// Fetches a payment intent by ID.
    fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, CommerceError>;

    /// Lists all refunds on a payment intent.
    fn list_refunds(&self, intent_id: &str) -> Result<Vec<ProviderRefund>, CommerceError>;

    /// Moves funds from a captured charge to a connected account.
    fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer, CommerceError>;
}
