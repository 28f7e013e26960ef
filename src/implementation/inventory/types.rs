//! Type definitions for the inventory ledger.

use crate::types::common::{current_timestamp, StoreId};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Catalog variant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantId(pub String);

impl VariantId {
    /// Creates a new variant ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inventory item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(pub String);

impl ItemId {
    /// Creates a new item ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique item ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("invitem_{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inventory location identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationId(pub String);

impl LocationId {
    /// Creates a new location ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique location ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("loc_{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// LOCATIONS
// ============================================================================

/// Warehouse/location definition, owned by a store.
#[derive(Debug, Clone)]
pub struct InventoryLocation {
    /// Location ID.
    pub id:         LocationId,
    /// Owning store.
    pub store_id:   StoreId,
    /// Location name.
    pub name:       String,
    /// Whether this is the store's default fulfillment location.
    pub is_default: bool,
    /// Whether location is active.
    pub is_active:  bool,
    /// Creation timestamp.
    pub created_at: u64,
}

impl InventoryLocation {
    /// Creates a new location for a store.
    #[must_use]
    pub fn new(store_id: StoreId, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            id: LocationId::generate(),
            store_id,
            name: name.into(),
            is_default,
            is_active: true,
            created_at: current_timestamp(),
        }
    }
}

// ============================================================================
// INVENTORY ITEM
// ============================================================================

/// Physical/shipping attributes per variant.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    /// Item ID.
    pub id:                ItemId,
    /// Variant this item tracks.
    pub variant_id:        VariantId,
    /// SKU snapshot.
    pub sku:               Option<String>,
    /// Unit cost in minor units.
    pub cost_amount:       u64,
    /// Weight in grams.
    pub weight_grams:      u32,
    /// Dimensions in millimeters (length, width, height).
    pub dimensions_mm:     Option<(u32, u32, u32)>,
    /// Country of origin code.
    pub country_of_origin: Option<String>,
    /// Creation timestamp.
    pub created_at:        u64,
    /// Last update timestamp.
    pub updated_at:        u64,
}

impl InventoryItem {
    /// Creates a new item for a variant.
    #[must_use]
    pub fn new(variant_id: VariantId, sku: Option<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: ItemId::generate(),
            variant_id,
            sku,
            cost_amount: 0,
            weight_grams: 0,
            dimensions_mm: None,
            country_of_origin: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// INVENTORY LEVEL
// ============================================================================

/// Per (item, location) stock counters.
///
/// Steady-state relationship: `on_hand == available + committed`. The
/// reserve/fulfill/release operations preserve it through each
/// transition; manual corrections adjust both sides together.
#[derive(Debug, Clone)]
pub struct InventoryLevel {
    /// Item being counted.
    pub item_id:     ItemId,
    /// Variant the item tracks (denormalized for lookups).
    pub variant_id:  VariantId,
    /// Location.
    pub location_id: LocationId,
    /// Sellable quantity.
    pub available:   i64,
    /// Reserved against open orders, not yet shipped.
    pub committed:   i64,
    /// On order from supplier.
    pub incoming:    i64,
    /// Physically present.
    pub on_hand:     i64,
    /// Shipped to customers (lifetime counter).
    pub shipped:     i64,
    /// Damaged/unsellable.
    pub damaged:     i64,
    /// Returned by customers (lifetime counter).
    pub returned:    i64,
    /// Creation timestamp.
    pub created_at:  u64,
    /// Last update timestamp.
    pub updated_at:  u64,
}

impl InventoryLevel {
    /// Creates an empty level.
    #[must_use]
    pub fn new(item_id: ItemId, variant_id: VariantId, location_id: LocationId) -> Self {
        let now = current_timestamp();
        Self {
            item_id,
            variant_id,
            location_id,
            available: 0,
            committed: 0,
            incoming: 0,
            on_hand: 0,
            shipped: 0,
            damaged: 0,
            returned: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Updates the timestamp.
    pub(crate) fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}

/// Key for level lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelKey {
    /// Item ID.
    pub item_id:     ItemId,
    /// Location ID.
    pub location_id: LocationId,
}

// ============================================================================
// ADJUSTMENT LEDGER
// ============================================================================

/// Event that caused an inventory change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentType {
    /// Stock reserved against a sale.
    Reserve,
    /// Reservation released (cancellation, refund with restock).
    Release,
    /// Reserved stock shipped against an order.
    Fulfill,
    /// Stock shipped outside the order flow.
    Ship,
    /// Stock received into sellable inventory.
    Restock,
    /// Manual correction.
    Adjustment,
    /// Customer return.
    Return,
    /// Stock damaged.
    Damage,
}

impl AdjustmentType {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Release => "release",
            Self::Fulfill => "fulfill",
            Self::Ship => "ship",
            Self::Restock => "restock",
            Self::Adjustment => "adjustment",
            Self::Return => "return",
            Self::Damage => "damage",
        }
    }
}

/// Deltas an adjustment applied to the replayable counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDeltas {
    /// Change to `available`.
    pub available: i64,
    /// Change to `committed`.
    pub committed: i64,
    /// Change to `on_hand`.
    pub on_hand:   i64,
}

impl CounterDeltas {
    /// Sums two delta sets.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self {
            available: self.available + other.available,
            committed: self.committed + other.committed,
            on_hand:   self.on_hand + other.on_hand,
        }
    }
}

/// Immutable, append-only ledger row recording one inventory change.
#[derive(Debug, Clone)]
pub struct InventoryAdjustment {
    /// Adjustment ID.
    pub id:          String,
    /// Item ID.
    pub item_id:     ItemId,
    /// Variant ID.
    pub variant_id:  VariantId,
    /// Location ID.
    pub location_id: LocationId,
    /// Event type.
    pub event:       AdjustmentType,
    /// Headline signed quantity of the event.
    pub quantity:    i64,
    /// Exact deltas applied to the replayable counters.
    pub deltas:      CounterDeltas,
    /// `available` before the change.
    pub previous_available: i64,
    /// Reason for the change.
    pub reason:      String,
    /// Reference back to the order/fulfillment that caused it.
    pub reference:   Option<String>,
    /// User who made the change, if user-initiated.
    pub user:        Option<String>,
    /// Timestamp.
    pub created_at:  u64,
}

impl InventoryAdjustment {
    /// Creates a new adjustment row.
    #[must_use]
    pub fn new(
        level: &InventoryLevel, event: AdjustmentType, quantity: i64, deltas: CounterDeltas,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("adj_{}", uuid::Uuid::new_v4()),
            item_id: level.item_id.clone(),
            variant_id: level.variant_id.clone(),
            location_id: level.location_id.clone(),
            event,
            quantity,
            deltas,
            previous_available: level.available,
            reason: reason.into(),
            reference: None,
            user: None,
            created_at: current_timestamp(),
        }
    }

    /// Sets the order/fulfillment reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

// ============================================================================
// FILTERS & PAGINATION
// ============================================================================

/// Typed filter over inventory levels, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct LevelFilter {
    location: Option<LocationId>,
    store:    Option<StoreId>,
    search:   Option<String>,
}

impl LevelFilter {
    /// Empty filter matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one location.
    #[must_use]
    pub fn location(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }

    /// Restricts to locations owned by one store.
    #[must_use]
    pub fn store(mut self, store: StoreId) -> Self {
        self.store = Some(store);
        self
    }

    /// Case-insensitive match against SKU or variant ID.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into().to_lowercase());
        self
    }

    pub(crate) fn location_filter(&self) -> Option<&LocationId> {
        self.location.as_ref()
    }

    pub(crate) fn store_filter(&self) -> Option<&StoreId> {
        self.store.as_ref()
    }

    pub(crate) fn search_filter(&self) -> Option<&str> {
        self.search.as_deref()
    }
}

/// Pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Zero-based page index.
    pub number:   usize,
    /// Rows per page.
    pub per_page: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: 0, per_page: 50 }
    }
}

/// One line of a multi-line reserve/fulfill request.
#[derive(Debug, Clone)]
pub struct StockLine {
    /// Variant to adjust.
    pub variant_id:  VariantId,
    /// Location to adjust at.
    pub location_id: LocationId,
    /// Quantity (positive).
    pub quantity:    u32,
}

/// What a level deletion cascaded to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// The level row was deleted.
    pub level_deleted:   bool,
    /// It was the item's last level, so the item was deleted too.
    pub item_deleted:    bool,
    /// It was the variant's last item, so the variant registration was
    /// removed as well.
    pub variant_deleted: bool,
}
