//! Type definitions shared across the marketplace core

pub mod common;

/// Runtime configuration, constructed once at startup and injected into
/// the core (no lazily-initialized globals).
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Shared secret used to verify webhook signatures.
    pub webhook_secret:     String,
    /// Platform fee in basis points taken from each store's share of a
    /// multi-store checkout (500 = 5%).
    pub platform_fee_bps:   u32,
    /// Default currency for new orders.
    pub currency:           String,
    /// Invoice payment-link lifetime in seconds.
    pub invoice_ttl_secs:   u64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            webhook_secret:   String::new(),
            platform_fee_bps: 500,
            currency:         "USD".to_string(),
            invoice_ttl_secs: 7 * 24 * 3600,
        }
    }
}

impl CommerceConfig {
    /// Reads the webhook secret from the environment, keeping defaults
    /// for everything else.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
            ..Self::default()
        }
    }
}
