//! Order state machine.
//!
//! The `completed` status is derived, never stored independently and
//! trusted: whenever the payment or fulfillment axis changes, callers
//! re-run [`derive_status`]. Both the payment reconciler and the
//! fulfillment processor consume this one function, so the invariant
//! `status == Completed <=> paid && fulfilled` cannot diverge between
//! call sites.

use super::types::basic_types::{FulfillmentStatus, OrderStatus, PaymentStatus, WorkflowStatus};
use super::types::order::Order;
use crate::errors::CommerceError;

/// Whether the payment axis counts as paid for completion purposes.
#[must_use]
pub fn is_paid_state(payment: PaymentStatus) -> bool {
    matches!(payment, PaymentStatus::Paid | PaymentStatus::PartiallyRefunded)
}

/// Whether the fulfillment axis counts as fulfilled for completion
/// purposes.
#[must_use]
pub fn is_fulfilled_state(fulfillment: FulfillmentStatus) -> bool {
    matches!(fulfillment, FulfillmentStatus::Fulfilled | FulfillmentStatus::Partial)
}

/// Re-derives the order status from the payment and fulfillment axes.
///
/// Paid AND fulfilled upgrades to `Completed`. A `Completed` order whose
/// axes no longer qualify (a full refund landed) reverts to `Open` so
/// the completion invariant holds at every point. Canceled and archived
/// orders are explicit terminal states and are never changed here.
#[must_use]
pub fn derive_status(
    current: OrderStatus, payment: PaymentStatus, fulfillment: FulfillmentStatus,
) -> OrderStatus {
    if matches!(current, OrderStatus::Canceled | OrderStatus::Archived) {
        return current;
    }
    if is_paid_state(payment) && is_fulfilled_state(fulfillment) {
        return OrderStatus::Completed;
    }
    if current == OrderStatus::Completed {
        // Completion no longer justified.
        return OrderStatus::Open;
    }
    current
}

/// Hard preconditions for fulfillment. Draft and canceled orders cannot
/// be fulfilled; held orders are blocked until the hold is lifted.
pub fn can_fulfill(order: &Order) -> Result<(), CommerceError> {
    match order.status {
        OrderStatus::Draft => {
            return Err(CommerceError::Conflict(format!(
                "order {} is a draft and cannot be fulfilled",
                order.id
            )));
        },
        OrderStatus::Canceled => {
            return Err(CommerceError::Conflict(format!(
                "order {} is canceled and cannot be fulfilled",
                order.id
            )));
        },
        _ => {},
    }
    if order.workflow_status == WorkflowStatus::OnHold {
        return Err(CommerceError::Conflict(format!(
            "order {} is on hold; resolve the hold before fulfilling",
            order.id
        )));
    }
    Ok(())
}

/// Recomputes an order's payment axis from its payment records.
///
/// Used by the refund path: the aggregate is recomputed from all
/// payments rather than toggled in place.
#[must_use]
pub fn aggregate_payment_status(order: &Order) -> PaymentStatus {
    if order.payment_status.is_absorbing() {
        return order.payment_status;
    }
    if order.payments.is_empty() {
        return PaymentStatus::Pending;
    }
    let paid = order.paid_amount();
    let refunded = order.payments_refunded_amount();
    if refunded == 0 {
        PaymentStatus::Paid
    } else if refunded >= paid {
        PaymentStatus::Refunded
    } else {
        PaymentStatus::PartiallyRefunded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_and_partial_fulfillment_completes() {
        let status = derive_status(
            OrderStatus::Open,
            PaymentStatus::Paid,
            FulfillmentStatus::Partial,
        );
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn partially_refunded_still_counts_as_paid() {
        let status = derive_status(
            OrderStatus::Open,
            PaymentStatus::PartiallyRefunded,
            FulfillmentStatus::Fulfilled,
        );
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn unpaid_order_is_never_completed() {
        let status = derive_status(
            OrderStatus::Open,
            PaymentStatus::Pending,
            FulfillmentStatus::Fulfilled,
        );
        assert_eq!(status, OrderStatus::Open);
    }

    #[test]
    fn full_refund_reverts_completion() {
        let status = derive_status(
            OrderStatus::Completed,
            PaymentStatus::Refunded,
            FulfillmentStatus::Fulfilled,
        );
        assert_eq!(status, OrderStatus::Open);
    }

    #[test]
    fn canceled_is_never_resurrected() {
        let status = derive_status(
            OrderStatus::Canceled,
            PaymentStatus::Paid,
            FulfillmentStatus::Fulfilled,
        );
        assert_eq!(status, OrderStatus::Canceled);
    }
}
