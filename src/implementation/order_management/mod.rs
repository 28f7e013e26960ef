//! Order management: the order/draft aggregate, the state machine, and
//! the service operating on both.
//!
//! Drafts are mutable pre-orders; completing a draft is the first point
//! inventory is touched for the sale. The `status` axis is re-derived
//! from the payment and fulfillment axes by `status::derive_status`,
//! which is the single source of truth for the completion invariant.

pub mod status;
pub mod types;

mod service;


pub use service::{
    DiscountInput, DraftLineInput, DraftOrderInput, GuestOrderLine, GuestOrderOutcome,
    GuestOrderRequest, NotificationSender, OrderFilter, OrderService,
};
pub use types::*;
