//! Payment records and the seller balance ledger.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::errors::CommerceError;
use crate::implementation::order_management::types::basic_types::{OrderId, PaymentStatus};
use crate::types::common::{current_timestamp, StoreId};

/// Where the money for a payment currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Captured on the platform account, not yet moved.
    Held,
    /// Transferred to the seller's connected account.
    Transferred,
    /// Owed to the seller outside the provider (manual payments).
    PendingPayout,
}

impl TransferStatus {
    /// Get status display name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Held => "Held",
            Self::Transferred => "Transferred",
            Self::PendingPayout => "Pending Payout",
        }
    }
}

/// One payment recorded against an order.
#[derive(Debug, Clone)]
pub struct OrderPayment {
    /// Payment record ID.
    pub id:                  String,
    /// Provider payment intent ID; `None` for manual payments.
    pub provider_payment_id: Option<String>,
    /// Gross amount in minor units.
    pub amount:              u64,
    /// Platform fee withheld, in minor units.
    pub platform_fee_amount: u64,
    /// Amount owed to the seller after fees.
    pub net_amount:          u64,
    /// Refunded-to-date total, written back from the provider.
    pub refunded_amount:     u64,
    /// Payment status of this record.
    pub status:              PaymentStatus,
    /// Transfer state of the funds.
    pub transfer_status:     TransferStatus,
    /// Created timestamp
    pub created_at:          u64,
}

impl OrderPayment {
    /// Manual payment recorded outside the provider (mark-as-paid).
    #[must_use]
    pub fn manual(amount: u64) -> Self {
        Self {
            id: format!("pay_{}", uuid::Uuid::new_v4()),
            provider_payment_id: None,
            amount,
            platform_fee_amount: 0,
            net_amount: amount,
            refunded_amount: 0,
            status: PaymentStatus::Paid,
            transfer_status: TransferStatus::PendingPayout,
            created_at: current_timestamp(),
        }
    }

    /// Payment captured through the provider. Funds start `Held` until a
    /// transfer to the seller account succeeds.
    #[must_use]
    pub fn from_provider(provider_payment_id: String, amount: u64, platform_fee: u64) -> Self {
        Self {
            id: format!("pay_{}", uuid::Uuid::new_v4()),
            provider_payment_id: Some(provider_payment_id),
            amount,
            platform_fee_amount: platform_fee,
            net_amount: amount.saturating_sub(platform_fee),
            refunded_amount: 0,
            status: PaymentStatus::Paid,
            transfer_status: TransferStatus::Held,
            created_at: current_timestamp(),
        }
    }

    /// Marks the funds as transferred to the seller account.
    pub fn mark_transferred(&mut self) {
        self.transfer_status = TransferStatus::Transferred;
    }

    /// Writes the provider's refunded-to-date total onto this record and
    /// recomputes its status. The total is clamped to the gross amount.
    pub fn apply_refund_total(&mut self, total_refunded: u64) {
        self.refunded_amount = total_refunded.min(self.amount);
        self.status = if self.refunded_amount == 0 {
            PaymentStatus::Paid
        } else if self.refunded_amount >= self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
    }
}

/// Direction of a seller balance entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEntryKind {
    /// Funds added to the seller's balance.
    Credit,
    /// Funds removed from the seller's balance.
    Debit,
}

/// Append-only seller balance entry with before/after snapshots, so the
/// running balance is auditable from the transaction list alone.
#[derive(Debug, Clone)]
pub struct SellerBalanceTransaction {
    /// Transaction ID.
    pub id:             String,
    /// Seller store.
    pub store_id:       StoreId,
    /// Order this entry settles, if any.
    pub order_id:       Option<OrderId>,
    /// Credit or debit.
    pub kind:           BalanceEntryKind,
    /// Amount in minor units.
    pub amount:         u64,
    /// Balance before this entry.
    pub balance_before: u64,
    /// Balance after this entry.
    pub balance_after:  u64,
    /// Human-readable description.
    pub description:    String,
    /// Created timestamp
    pub created_at:     u64,
}

/// Per-store balance ledger. Credits land after a successful transfer,
/// so the full balance is payout-eligible.
#[derive(Debug, Clone, Default)]
pub struct SellerLedger {
    balances:     Arc<Mutex<HashMap<StoreId, u64>>>,
    transactions: Arc<Mutex<Vec<SellerBalanceTransaction>>>,
}

impl SellerLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits a store's balance.
    pub fn record_credit(
        &self, store_id: &StoreId, amount: u64, order_id: Option<OrderId>,
        description: impl Into<String>,
    ) -> Result<SellerBalanceTransaction, CommerceError> {
        self.record(store_id, BalanceEntryKind::Credit, amount, order_id, description.into())
    }

    /// Debits a store's balance. Fails rather than going negative.
    pub fn record_debit(
        &self, store_id: &StoreId, amount: u64, order_id: Option<OrderId>,
        description: impl Into<String>,
    ) -> Result<SellerBalanceTransaction, CommerceError> {
        self.record(store_id, BalanceEntryKind::Debit, amount, order_id, description.into())
    }

    /// Current balance for a store.
    pub fn balance(&self, store_id: &StoreId) -> Result<u64, CommerceError> {
        let balances = self.balances.lock().map_err(|_| CommerceError::LockError)?;
        Ok(balances.get(store_id).copied().unwrap_or(0))
    }

    /// Amount eligible for payout. Equals the balance: only settled
    /// transfers are ever credited.
    pub fn payout_eligible(&self, store_id: &StoreId) -> Result<u64, CommerceError> {
        self.balance(store_id)
    }

    /// All transactions for a store, oldest first.
    pub fn transactions_for(
        &self, store_id: &StoreId,
    ) -> Result<Vec<SellerBalanceTransaction>, CommerceError> {
        let transactions = self.transactions.lock().map_err(|_| CommerceError::LockError)?;
        Ok(transactions.iter().filter(|t| &t.store_id == store_id).cloned().collect())
    }

    fn record(
        &self, store_id: &StoreId, kind: BalanceEntryKind, amount: u64, order_id: Option<OrderId>,
        description: String,
    ) -> Result<SellerBalanceTransaction, CommerceError> {
        let mut balances = self.balances.lock().map_err(|_| CommerceError::LockError)?;
        let balance = balances.entry(store_id.clone()).or_insert(0);
        let balance_before = *balance;
        let balance_after = match kind {
            BalanceEntryKind::Credit => balance_before + amount,
            BalanceEntryKind::Debit => {
                balance_before.checked_sub(amount).ok_or_else(|| {
                    CommerceError::ValidationError(format!(
                        "debit of {} exceeds balance {} for store {}",
                        amount, balance_before, store_id
                    ))
                })?
            },
        };
        *balance = balance_after;

        let transaction = SellerBalanceTransaction {
            id: format!("sbt_{}", uuid::Uuid::new_v4()),
            store_id: store_id.clone(),
            order_id,
            kind,
            amount,
            balance_before,
            balance_after,
            description,
            created_at: current_timestamp(),
        };
        let mut transactions =
            self.transactions.lock().map_err(|_| CommerceError::LockError)?;
        transactions.push(transaction.clone());
        Ok(transaction)
    }
}
