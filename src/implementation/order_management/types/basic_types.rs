//! # Order Management Types - Basic Types
//!
//! Identifiers and status enums for orders and draft orders.

// ============================================================================
// BASIC IDENTIFIERS
// ============================================================================

/// Unique order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl OrderId {
    /// Creates a new order ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ord_{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique draft order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftOrderId(pub String);

impl DraftOrderId {
    /// Creates a new draft order ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique draft order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("draft_{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for DraftOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// STATUS ENUMS
// ============================================================================

/// Order status axis.
///
/// `Completed` is derived from the payment and fulfillment axes, never
/// set directly by most operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStatus {
    /// Not yet finalized (manual order being built).
    Draft,
    /// Placed and payable.
    #[default]
    Open,
    /// Paid and (at least partially) fulfilled.
    Completed,
    /// Explicitly canceled.
    Canceled,
    /// Archived out of active views.
    Archived,
}

impl OrderStatus {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Archived => "archived",
        }
    }
}

/// Payment status axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    /// Awaiting payment.
    #[default]
    Pending,
    /// Fully paid.
    Paid,
    /// Paid, partially refunded since.
    PartiallyRefunded,
    /// Fully refunded.
    Refunded,
    /// Payment failed (absorbing).
    Failed,
    /// Voided (absorbing).
    Void,
}

impl PaymentStatus {
    /// Whether this state absorbs further transitions.
    #[must_use]
    pub fn is_absorbing(&self) -> bool {
        matches!(self, Self::Failed | Self::Void)
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::Void => "void",
        }
    }
}

/// Fulfillment status axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FulfillmentStatus {
    /// Nothing shipped yet.
    #[default]
    Unfulfilled,
    /// Some line items shipped.
    Partial,
    /// Every line item shipped in full.
    Fulfilled,
    /// Fulfillment canceled (absorbing).
    Canceled,
}

impl FulfillmentStatus {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unfulfilled => "unfulfilled",
            Self::Partial => "partial",
            Self::Fulfilled => "fulfilled",
            Self::Canceled => "canceled",
        }
    }
}

/// Operational workflow flag, independent of the other axes.
///
/// `OnHold` blocks fulfillment until a human resolves the underlying
/// issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowStatus {
    /// Normal processing.
    #[default]
    Normal,
    /// Being worked on.
    InProgress,
    /// Fulfillment blocked.
    OnHold,
}

impl WorkflowStatus {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::InProgress => "in_progress",
            Self::OnHold => "on_hold",
        }
    }
}
