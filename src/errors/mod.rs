//! Error types for the marketplace core

use std::fmt;

/// Marketplace core errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Lock acquisition failed.
    LockError,
    /// No or invalid session.
    Unauthorized,
    /// Store not found.
    StoreNotFound(String),
    /// Order not found.
    OrderNotFound(String),
    /// Draft order not found.
    DraftOrderNotFound(String),
    /// Listing/variant not found.
    VariantNotFound(String),
    /// Location not found.
    LocationNotFound(String),
    /// Store has no default inventory location.
    NoDefaultLocation(String),
    /// Inventory level not found.
    InventoryNotFound {
        /// Item ID.
        item_id:     String,
        /// Location ID.
        location_id: String,
    },
    /// Inventory item not found.
    ItemNotFound(String),
    /// Payment record not found.
    PaymentNotFound(String),
    /// Malformed or insufficient input.
    ValidationError(String),
    /// Not enough available stock to reserve.
    InsufficientStock {
        /// Item ID.
        item_id:   String,
        /// Available quantity.
        available: u32,
        /// Requested quantity.
        requested: u32,
    },
    /// Webhook signature verification failed.
    InvalidSignature,
    /// Operation conflicts with current state (e.g. draft already completed).
    Conflict(String),
    /// Payment gateway call failed.
    ProviderError(String),
    /// Internal error.
    InternalError(String),
}

impl fmt::Display for CommerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockError => write!(f, "Failed to acquire lock"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::StoreNotFound(id) => write!(f, "Store not found: {}", id),
            Self::OrderNotFound(id) => write!(f, "Order not found: {}", id),
            Self::DraftOrderNotFound(id) => write!(f, "Draft order not found: {}", id),
            Self::VariantNotFound(id) => write!(f, "Variant not found: {}", id),
            Self::LocationNotFound(id) => write!(f, "Location not found: {}", id),
            Self::NoDefaultLocation(store) => {
                write!(f, "Store {} has no default inventory location", store)
            },
            Self::InventoryNotFound { item_id, location_id } => {
                write!(
                    f,
                    "Inventory level not found for item {} at location {}",
                    item_id, location_id
                )
            },
            Self::ItemNotFound(id) => write!(f, "Inventory item not found: {}", id),
            Self::PaymentNotFound(id) => write!(f, "Payment not found: {}", id),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::InsufficientStock { item_id, available, requested } => {
                write!(
                    f,
                    "Insufficient stock for {}: available {}, requested {}",
                    item_id, available, requested
                )
            },
            Self::InvalidSignature => write!(f, "Invalid webhook signature"),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::ProviderError(msg) => write!(f, "Payment provider error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CommerceError {}

impl CommerceError {
    /// Whether the message is safe to surface to the end user verbatim.
    ///
    /// Validation and stock errors are informative and safe; everything
    /// else is logged server-side and replaced by a generic message.
    #[must_use]
    pub fn is_user_safe(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::InsufficientStock { .. }
                | Self::Conflict(_)
                | Self::OrderNotFound(_)
                | Self::DraftOrderNotFound(_)
                | Self::VariantNotFound(_)
                | Self::LocationNotFound(_)
                | Self::NoDefaultLocation(_)
                | Self::InventoryNotFound { .. }
                | Self::ItemNotFound(_)
                | Self::StoreNotFound(_)
        )
    }
}

/// Result type for commerce operations.
pub type CommerceResult<T> = Result<T, CommerceError>;

/// Discriminated result returned across the action boundary.
///
/// Callers (dashboard, webhook dispatcher) check `success` before
/// trusting `data`; internal errors are logged and replaced by a
/// generic message before crossing this boundary.
#[derive(Debug, Clone)]
pub struct ActionResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// User-facing error message when `success` is false.
    pub error:   Option<String>,
    /// Payload when `success` is true.
    pub data:    Option<T>,
}

impl<T> ActionResponse<T> {
    /// Successful response carrying data.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self { success: true, error: None, data: Some(data) }
    }

    /// Failed response from a commerce error, applying the verbatim /
    /// generic surfacing policy.
    #[must_use]
    pub fn err(error: &CommerceError) -> Self {
        let message = if error.is_user_safe() {
            error.to_string()
        } else {
            tracing::error!(error = %error, "internal error crossing action boundary");
            "Something went wrong. Please try again.".to_string()
        };
        Self { success: false, error: Some(message), data: None }
    }
}

impl<T> From<CommerceResult<T>> for ActionResponse<T> {
    fn from(result: CommerceResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}
