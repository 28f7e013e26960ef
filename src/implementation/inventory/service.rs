//! Inventory service implementation.
//!
//! All counter mutations go through [`InventoryService::apply`], which
//! writes the matching adjustment row while the levels lock is still
//! held. Lock order is always items -> levels -> adjustments.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::info;

use super::types::{
    AdjustmentType, CascadeOutcome, CounterDeltas, InventoryAdjustment, InventoryItem,
    InventoryLevel, InventoryLocation, ItemId, LevelFilter, LevelKey, LocationId, Page, StockLine,
    VariantId,
};
use crate::errors::CommerceError;
use crate::types::common::StoreId;

/// Inventory ledger service.
#[derive(Debug, Default)]
pub struct InventoryService {
    items:       Arc<Mutex<HashMap<ItemId, InventoryItem>>>,
    variants:    Arc<Mutex<HashSet<VariantId>>>,
    levels:      Arc<Mutex<HashMap<LevelKey, InventoryLevel>>>,
    locations:   Arc<Mutex<HashMap<LocationId, InventoryLocation>>>,
    adjustments: Arc<Mutex<Vec<InventoryAdjustment>>>,
}

impl InventoryService {
    /// Creates a new inventory service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // LOCATION MANAGEMENT
    // ========================================================================

    /// Adds a location.
    pub fn add_location(&self, location: InventoryLocation) -> Result<(), CommerceError> {
        let mut locations = self.locations.lock().map_err(|_| CommerceError::LockError)?;
        if locations.contains_key(&location.id) {
            return Err(CommerceError::Conflict(format!(
                "location {} already exists",
                location.id
            )));
        }
        locations.insert(location.id.clone(), location);
        Ok(())
    }

    /// Gets a location.
    pub fn get_location(&self, id: &LocationId) -> Result<InventoryLocation, CommerceError> {
        let locations = self.locations.lock().map_err(|_| CommerceError::LockError)?;
        locations
            .get(id)
            .cloned()
            .ok_or_else(|| CommerceError::LocationNotFound(id.0.clone()))
    }

    /// Gets a store's active locations.
    pub fn list_locations(&self, store: &StoreId) -> Result<Vec<InventoryLocation>, CommerceError> {
        let locations = self.locations.lock().map_err(|_| CommerceError::LockError)?;
        Ok(locations
            .values()
            .filter(|l| &l.store_id == store && l.is_active)
            .cloned()
            .collect())
    }

    /// Resolves a store's default fulfillment location.
    pub fn default_location(&self, store: &StoreId) -> Result<InventoryLocation, CommerceError> {
        let locations = self.locations.lock().map_err(|_| CommerceError::LockError)?;
        locations
            .values()
            .find(|l| &l.store_id == store && l.is_default && l.is_active)
            .cloned()
            .ok_or_else(|| CommerceError::NoDefaultLocation(store.0.clone()))
    }

    // ========================================================================
    // ITEM MANAGEMENT
    // ========================================================================

    /// Creates the inventory item for a variant, or returns the existing
    /// one. Registers the variant for cascade accounting.
    pub fn upsert_item(
        &self, variant_id: VariantId, sku: Option<String>,
    ) -> Result<InventoryItem, CommerceError> {
        let mut items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        if let Some(existing) = items.values().find(|i| i.variant_id == variant_id) {
            return Ok(existing.clone());
        }

        let item = InventoryItem::new(variant_id.clone(), sku);
        items.insert(item.id.clone(), item.clone());
        drop(items);

        let mut variants = self.variants.lock().map_err(|_| CommerceError::LockError)?;
        variants.insert(variant_id);
        Ok(item)
    }

    /// Gets an item.
    pub fn get_item(&self, id: &ItemId) -> Result<InventoryItem, CommerceError> {
        let items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        items.get(id).cloned().ok_or_else(|| CommerceError::ItemNotFound(id.0.clone()))
    }

    /// Resolves the item tracking a variant.
    pub fn item_for_variant(&self, variant: &VariantId) -> Result<InventoryItem, CommerceError> {
        let items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        items
            .values()
            .find(|i| &i.variant_id == variant)
            .cloned()
            .ok_or_else(|| CommerceError::VariantNotFound(variant.0.clone()))
    }

    /// Updates an item's unit cost.
    pub fn update_item_cost(&self, id: &ItemId, cost_amount: u64) -> Result<(), CommerceError> {
        let mut items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        let item = items.get_mut(id).ok_or_else(|| CommerceError::ItemNotFound(id.0.clone()))?;
        item.cost_amount = cost_amount;
        item.updated_at = crate::types::common::current_timestamp();
        Ok(())
    }

    /// Whether a variant is registered.
    pub fn variant_exists(&self, variant: &VariantId) -> Result<bool, CommerceError> {
        let variants = self.variants.lock().map_err(|_| CommerceError::LockError)?;
        Ok(variants.contains(variant))
    }

    // ========================================================================
    // COUNTER MUTATIONS
    // ========================================================================

    /// Reserves stock for a single line.
    pub fn reserve(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        order_ref: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let line = StockLine {
            variant_id:  variant.clone(),
            location_id: location.clone(),
            quantity,
        };
        self.reserve_all(&[line], order_ref)
    }

    /// Reserves stock for every line, atomically.
    ///
    /// Validates every line against `available` under one lock before
    /// mutating anything; any failure leaves all counters untouched.
    /// `available` never goes negative.
    pub fn reserve_all(
        &self, lines: &[StockLine], order_ref: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let order_ref = order_ref.into();
        let keys = self.resolve_keys(lines)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;

        // All-or-nothing validation pass.
        for (line, key) in lines.iter().zip(&keys) {
            let level = levels.get(key).ok_or_else(|| CommerceError::InventoryNotFound {
                item_id:     key.item_id.0.clone(),
                location_id: key.location_id.0.clone(),
            })?;
            if level.available < i64::from(line.quantity) {
                return Err(CommerceError::InsufficientStock {
                    item_id:   key.item_id.0.clone(),
                    available: level.available.max(0) as u32,
                    requested: line.quantity,
                });
            }
        }

        for (line, key) in lines.iter().zip(&keys) {
            let qty = i64::from(line.quantity);
            let deltas = CounterDeltas { available: -qty, committed: qty, on_hand: 0 };
            self.apply(
                &mut levels,
                key,
                AdjustmentType::Reserve,
                qty,
                deltas,
                "Stock reserved for order",
                Some(order_ref.clone()),
                None,
            )?;
        }
        info!(reference = %order_ref, lines = lines.len(), "inventory reserved");
        Ok(())
    }

    /// Ships reserved stock for a single line.
    pub fn fulfill(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        order_ref: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let line = StockLine {
            variant_id:  variant.clone(),
            location_id: location.clone(),
            quantity,
        };
        self.fulfill_all(&[line], order_ref)
    }

    /// Ships reserved stock for every line, atomically.
    ///
    /// Decrements `committed` and `on_hand`; `available` was already
    /// decremented at reserve time and is not touched.
    pub fn fulfill_all(
        &self, lines: &[StockLine], order_ref: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let order_ref = order_ref.into();
        let keys = self.resolve_keys(lines)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;

        for (line, key) in lines.iter().zip(&keys) {
            let level = levels.get(key).ok_or_else(|| CommerceError::InventoryNotFound {
                item_id:     key.item_id.0.clone(),
                location_id: key.location_id.0.clone(),
            })?;
            if level.committed < i64::from(line.quantity) {
                return Err(CommerceError::ValidationError(format!(
                    "fulfillment of {} exceeds committed quantity {} for item {}",
                    line.quantity, level.committed, key.item_id
                )));
            }
        }

        for (line, key) in lines.iter().zip(&keys) {
            let qty = i64::from(line.quantity);
            let deltas = CounterDeltas { available: 0, committed: -qty, on_hand: -qty };
            self.apply(
                &mut levels,
                key,
                AdjustmentType::Fulfill,
                qty,
                deltas,
                "Stock shipped against order",
                Some(order_ref.clone()),
                None,
            )?;
        }
        info!(reference = %order_ref, lines = lines.len(), "inventory fulfilled");
        Ok(())
    }

    /// Releases a reservation back to sellable stock.
    pub fn release(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        reason: impl Into<String>, reference: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let level = levels.get(&key).ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     key.item_id.0.clone(),
            location_id: key.location_id.0.clone(),
        })?;

        // Release no more than is actually committed.
        let qty = i64::from(quantity).min(level.committed);
        let deltas = CounterDeltas { available: qty, committed: -qty, on_hand: 0 };
        self.apply(
            &mut levels,
            &key,
            AdjustmentType::Release,
            qty,
            deltas,
            reason,
            Some(reference.into()),
            None,
        )
    }

    /// Receives stock into sellable inventory.
    pub fn restock(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        reason: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        self.ensure_level(&mut levels, &key, variant);
        let qty = i64::from(quantity);
        let deltas = CounterDeltas { available: qty, committed: 0, on_hand: qty };
        self.apply(&mut levels, &key, AdjustmentType::Restock, qty, deltas, reason, None, None)
    }

    /// Records a customer return back into sellable stock.
    pub fn record_return(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        reference: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let qty = i64::from(quantity);
        let deltas = CounterDeltas { available: qty, committed: 0, on_hand: qty };
        self.apply(
            &mut levels,
            &key,
            AdjustmentType::Return,
            qty,
            deltas,
            "Customer return",
            Some(reference.into()),
            None,
        )
    }

    /// Moves sellable stock to the damaged bucket.
    pub fn record_damage(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        reason: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let level = levels.get(&key).ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     key.item_id.0.clone(),
            location_id: key.location_id.0.clone(),
        })?;
        let qty = i64::from(quantity).min(level.available);
        let deltas = CounterDeltas { available: -qty, committed: 0, on_hand: -qty };
        self.apply(&mut levels, &key, AdjustmentType::Damage, qty, deltas, reason, None, None)
    }

    /// Ships stock outside the order flow (manual shipment).
    pub fn record_shipment(
        &self, variant: &VariantId, location: &LocationId, quantity: u32,
        reason: impl Into<String>,
    ) -> Result<(), CommerceError> {
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let level = levels.get(&key).ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     key.item_id.0.clone(),
            location_id: key.location_id.0.clone(),
        })?;
        if level.available < i64::from(quantity) {
            return Err(CommerceError::InsufficientStock {
                item_id:   key.item_id.0.clone(),
                available: level.available.max(0) as u32,
                requested: quantity,
            });
        }
        let qty = i64::from(quantity);
        let deltas = CounterDeltas { available: -qty, committed: 0, on_hand: -qty };
        self.apply(&mut levels, &key, AdjustmentType::Ship, qty, deltas, reason, None, None)
    }

    /// Manual admin correction of `available`.
    ///
    /// Adjusts `on_hand` by the same delta so the steady-state
    /// relationship `on_hand == available + committed` is preserved.
    pub fn set_available(
        &self, variant: &VariantId, location: &LocationId, new_available: i64,
        reason: impl Into<String>, user: Option<String>,
    ) -> Result<(), CommerceError> {
        if new_available < 0 {
            return Err(CommerceError::ValidationError(
                "available quantity cannot be negative".to_string(),
            ));
        }
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        self.ensure_level(&mut levels, &key, variant);
        let current = levels
            .get(&key)
            .map(|l| l.available)
            .unwrap_or(0);
        let delta = new_available - current;
        let deltas = CounterDeltas { available: delta, committed: 0, on_hand: delta };
        self.apply(&mut levels, &key, AdjustmentType::Adjustment, delta, deltas, reason, None, user)
    }

    /// Sets the incoming (on order from supplier) quantity.
    pub fn set_incoming(
        &self, variant: &VariantId, location: &LocationId, incoming: i64,
        reason: impl Into<String>, user: Option<String>,
    ) -> Result<(), CommerceError> {
        if incoming < 0 {
            return Err(CommerceError::ValidationError(
                "incoming quantity cannot be negative".to_string(),
            ));
        }
        let key = self.key_for(variant, location)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        self.ensure_level(&mut levels, &key, variant);
        let current = levels.get(&key).map(|l| l.incoming).unwrap_or(0);
        let delta = incoming - current;
        if let Some(level) = levels.get_mut(&key) {
            level.incoming = incoming;
            level.touch();
        }
        // Incoming is informational and does not move the replayable
        // counters; the row still records the change for the audit trail.
        if let Some(level) = levels.get(&key) {
            let adjustment =
                InventoryAdjustment::new(level, AdjustmentType::Adjustment, delta, CounterDeltas::default(), reason);
            let adjustment = match user {
                Some(u) => adjustment.with_user(u),
                None => adjustment,
            };
            let mut adjustments = self.adjustments.lock().map_err(|_| CommerceError::LockError)?;
            adjustments.push(adjustment);
        }
        Ok(())
    }

    // ========================================================================
    // DELETION CASCADE
    // ========================================================================

    /// Deletes a level, cascading to the item when it was the item's
    /// last level and to the variant registration when it was the
    /// variant's last item. The whole chain runs under the same locks.
    pub fn delete_level(
        &self, item_id: &ItemId, location: &LocationId,
    ) -> Result<CascadeOutcome, CommerceError> {
        let mut items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        let mut levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;

        let key = LevelKey { item_id: item_id.clone(), location_id: location.clone() };
        if levels.remove(&key).is_none() {
            return Err(CommerceError::InventoryNotFound {
                item_id:     item_id.0.clone(),
                location_id: location.0.clone(),
            });
        }
        let mut outcome = CascadeOutcome { level_deleted: true, ..CascadeOutcome::default() };

        let remaining_levels = levels.keys().filter(|k| &k.item_id == item_id).count();
        if remaining_levels == 0 {
            if let Some(item) = items.remove(item_id) {
                outcome.item_deleted = true;
                let remaining_items =
                    items.values().filter(|i| i.variant_id == item.variant_id).count();
                if remaining_items == 0 {
                    let mut variants =
                        self.variants.lock().map_err(|_| CommerceError::LockError)?;
                    outcome.variant_deleted = variants.remove(&item.variant_id);
                }
            }
        }
        info!(item = %item_id, location = %location, ?outcome, "inventory level deleted");
        Ok(outcome)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Gets the level for an item at a location.
    pub fn get_level(
        &self, item_id: &ItemId, location: &LocationId,
    ) -> Result<InventoryLevel, CommerceError> {
        let levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let key = LevelKey { item_id: item_id.clone(), location_id: location.clone() };
        levels.get(&key).cloned().ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     item_id.0.clone(),
            location_id: location.0.clone(),
        })
    }

    /// Gets the level for a variant at a location.
    pub fn level_for_variant(
        &self, variant: &VariantId, location: &LocationId,
    ) -> Result<InventoryLevel, CommerceError> {
        let key = self.key_for(variant, location)?;
        let levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        levels.get(&key).cloned().ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     key.item_id.0.clone(),
            location_id: key.location_id.0.clone(),
        })
    }

    /// Lists levels matching a filter, paginated, newest first.
    pub fn list_levels(
        &self, filter: &LevelFilter, page: Page,
    ) -> Result<Vec<InventoryLevel>, CommerceError> {
        let items = self.items.lock().map_err(|_| CommerceError::LockError)?;
        let levels = self.levels.lock().map_err(|_| CommerceError::LockError)?;
        let locations = self.locations.lock().map_err(|_| CommerceError::LockError)?;

        let mut rows: Vec<InventoryLevel> = levels
            .values()
            .filter(|level| {
                if let Some(location) = filter.location_filter() {
                    if &level.location_id != location {
                        return false;
                    }
                }
                if let Some(store) = filter.store_filter() {
                    let owned = locations
                        .get(&level.location_id)
                        .map(|l| &l.store_id == store)
                        .unwrap_or(false);
                    if !owned {
                        return false;
                    }
                }
                if let Some(term) = filter.search_filter() {
                    let sku_match = items
                        .get(&level.item_id)
                        .and_then(|i| i.sku.as_ref())
                        .map(|s| s.to_lowercase().contains(term))
                        .unwrap_or(false);
                    let variant_match = level.variant_id.0.to_lowercase().contains(term);
                    if !sku_match && !variant_match {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows
            .into_iter()
            .skip(page.number * page.per_page)
            .take(page.per_page)
            .collect())
    }

    /// Adjustment history for an item, newest first.
    pub fn adjustment_history(
        &self, item_id: &ItemId, limit: Option<usize>,
    ) -> Result<Vec<InventoryAdjustment>, CommerceError> {
        let adjustments = self.adjustments.lock().map_err(|_| CommerceError::LockError)?;
        let mut history: Vec<_> =
            adjustments.iter().filter(|a| &a.item_id == item_id).cloned().collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            history.truncate(limit);
        }
        Ok(history)
    }

    /// Folds the ledger for (item, location) into the counter deltas it
    /// implies. Counters must always equal their initial values plus
    /// this replay.
    pub fn replay_counters(
        &self, item_id: &ItemId, location: &LocationId,
    ) -> Result<CounterDeltas, CommerceError> {
        let adjustments = self.adjustments.lock().map_err(|_| CommerceError::LockError)?;
        Ok(adjustments
            .iter()
            .filter(|a| &a.item_id == item_id && &a.location_id == location)
            .fold(CounterDeltas::default(), |acc, a| acc.plus(a.deltas)))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn key_for(
        &self, variant: &VariantId, location: &LocationId,
    ) -> Result<LevelKey, CommerceError> {
        let item = self.item_for_variant(variant)?;
        Ok(LevelKey { item_id: item.id, location_id: location.clone() })
    }

    fn resolve_keys(&self, lines: &[StockLine]) -> Result<Vec<LevelKey>, CommerceError> {
        lines.iter().map(|l| self.key_for(&l.variant_id, &l.location_id)).collect()
    }

    fn ensure_level(
        &self, levels: &mut MutexGuard<'_, HashMap<LevelKey, InventoryLevel>>, key: &LevelKey,
        variant: &VariantId,
    ) {
        if !levels.contains_key(key) {
            levels.insert(
                key.clone(),
                InventoryLevel::new(key.item_id.clone(), variant.clone(), key.location_id.clone()),
            );
        }
    }

    /// Applies counter deltas and writes the adjustment row while the
    /// levels lock is held.
    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self, levels: &mut MutexGuard<'_, HashMap<LevelKey, InventoryLevel>>, key: &LevelKey,
        event: AdjustmentType, quantity: i64, deltas: CounterDeltas, reason: impl Into<String>,
        reference: Option<String>, user: Option<String>,
    ) -> Result<(), CommerceError> {
        let level = levels.get_mut(key).ok_or_else(|| CommerceError::InventoryNotFound {
            item_id:     key.item_id.0.clone(),
            location_id: key.location_id.0.clone(),
        })?;

        let mut adjustment = InventoryAdjustment::new(level, event, quantity, deltas, reason);
        if let Some(reference) = reference {
            adjustment = adjustment.with_reference(reference);
        }
        if let Some(user) = user {
            adjustment = adjustment.with_user(user);
        }

        level.available += deltas.available;
        level.committed += deltas.committed;
        level.on_hand += deltas.on_hand;
        match event {
            AdjustmentType::Fulfill | AdjustmentType::Ship => level.shipped += quantity,
            AdjustmentType::Return => level.returned += quantity,
            AdjustmentType::Damage => level.damaged += quantity,
            _ => {},
        }
        level.touch();

        let mut adjustments = self.adjustments.lock().map_err(|_| CommerceError::LockError)?;
        adjustments.push(adjustment);
        Ok(())
    }
}
