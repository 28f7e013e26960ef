//! Payment reconciler tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::ledger::{SellerLedger, TransferStatus};
use super::provider::{
    sign_body, CheckoutPurpose, CheckoutSession, PaymentIntent, PaymentProvider, ProviderRefund,
    StoreCharge, Transfer, TransferRequest,
};
use super::reconciler::{PaymentReconciler, WebhookOutcome};
use crate::errors::CommerceError;
use crate::implementation::fulfillment::{FulfillmentProcessor, FulfillmentRequestLine};
use crate::implementation::inventory::{InventoryLocation, InventoryService, VariantId};
use crate::implementation::order_management::types::basic_types::{OrderStatus, PaymentStatus};
use crate::implementation::order_management::{
    GuestOrderLine, GuestOrderOutcome, GuestOrderRequest, OrderService,
};
use crate::types::common::{Address, StoreId};
use crate::types::CommerceConfig;

const SECRET: &str = "whsec_test";

// ============================================================================
// MOCK PROVIDER
// ============================================================================

#[derive(Default)]
struct MockProvider {
    sessions:       Mutex<HashMap<String, CheckoutSession>>,
    intents:        Mutex<HashMap<String, PaymentIntent>>,
    refunds:        Mutex<HashMap<String, Vec<ProviderRefund>>>,
    failing_accounts: Mutex<Vec<String>>,
    transfers:      Mutex<Vec<TransferRequest>>,
}

impl MockProvider {
    fn seed_session(&self, session: CheckoutSession) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    fn seed_intent(&self, intent: PaymentIntent) {
        self.intents.lock().unwrap().insert(intent.id.clone(), intent);
    }

    fn seed_refunds(&self, intent_id: &str, refunds: Vec<ProviderRefund>) {
        self.refunds.lock().unwrap().insert(intent_id.to_string(), refunds);
    }

    fn fail_transfers_to(&self, account: &str) {
        self.failing_accounts.lock().unwrap().push(account.to_string());
    }

    fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

impl PaymentProvider for MockProvider {
    fn retrieve_checkout_session(
        &self, session_id: &str,
    ) -> Result<CheckoutSession, CommerceError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CommerceError::ProviderError(format!("no session {session_id}")))
    }

    fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, CommerceError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| CommerceError::ProviderError(format!("no intent {intent_id}")))
    }

    fn list_refunds(&self, intent_id: &str) -> Result<Vec<ProviderRefund>, CommerceError> {
        Ok(self.refunds.lock().unwrap().get(intent_id).cloned().unwrap_or_default())
    }

    fn create_transfer(&self, request: &TransferRequest) -> Result<Transfer, CommerceError> {
        if self.failing_accounts.lock().unwrap().contains(&request.destination_account) {
            return Err(CommerceError::ProviderError("transfer declined".to_string()));
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(request.clone());
        Ok(Transfer { id: format!("tr_{}", transfers.len()) })
    }
}

// ============================================================================
// FIXTURE
// ============================================================================

struct Fixture {
    inventory:  Arc<InventoryService>,
    orders:     Arc<OrderService>,
    provider:   Arc<MockProvider>,
    reconciler: PaymentReconciler,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let inventory = Arc::new(InventoryService::new());
    let orders = Arc::new(OrderService::new());
    let provider = Arc::new(MockProvider::default());
    let config = CommerceConfig { webhook_secret: SECRET.to_string(), ..CommerceConfig::default() };
    let reconciler = PaymentReconciler::new(
        config,
        Arc::clone(&provider) as Arc<dyn PaymentProvider>,
        Arc::clone(&orders),
        Arc::clone(&inventory),
        SellerLedger::new(),
    );
    Fixture { inventory, orders, provider, reconciler }
}

impl Fixture {
    /// Seeds a store with a default location and one stocked variant.
    fn seed_store(&self, store: &str, variant: &str, available: i64) {
        let store_id = StoreId::new(store);
        let location = InventoryLocation::new(store_id, "Main Warehouse", true);
        let location_id = location.id.clone();
        self.inventory.add_location(location).unwrap();
        let variant_id = VariantId::new(variant);
        self.inventory.upsert_item(variant_id.clone(), Some(format!("SKU-{variant}"))).unwrap();
        self.inventory
            .set_available(&variant_id, &location_id, available, "Initial stock", None)
            .unwrap();
    }

    /// Places a guest order in one store and returns its outcome.
    fn place_order(&self, store: &str, variant: &str, quantity: u32, unit_price: u64) -> GuestOrderOutcome {
        let request = GuestOrderRequest {
            customer_email:   "buyer@example.com".to_string(),
            currency:         "usd".to_string(),
            lines:            vec![GuestOrderLine {
                variant_id: variant.to_string(),
                store_id: store.to_string(),
                title: "Widget".to_string(),
                sku: None,
                quantity,
                unit_price_amount: unit_price,
            }],
            discount_amount:  0,
            shipping_amount:  0,
            tax_amount:       0,
            shipping_address: Address::default(),
            billing_address:  None,
        };
        self.orders.create_guest_order(&request, &self.inventory).unwrap()
    }

    fn deliver(&self, body: &str) -> Result<WebhookOutcome, CommerceError> {
        let signature = sign_body(SECRET, body.as_bytes());
        self.reconciler.handle_webhook(&signature, body.as_bytes())
    }
}

fn checkout_event(event_id: &str, session_id: &str) -> String {
    format!(
        r#"{{"id":"{event_id}","type":"checkout.session.completed","data":{{"object":{{"id":"{session_id}"}}}}}}"#
    )
}

fn refund_event(event_id: &str, intent_id: &str) -> String {
    format!(
        r#"{{"id":"{event_id}","type":"refund.updated","data":{{"object":{{"id":"re_1","payment_intent":"{intent_id}"}}}}}}"#
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn bad_signature_is_rejected_before_processing() {
    let f = fixture();
    let body = checkout_event("evt_1", "cs_1");
    let result = f.reconciler.handle_webhook("deadbeef", body.as_bytes());
    assert_eq!(result, Err(CommerceError::InvalidSignature));
}

#[test]
fn unknown_event_type_is_acknowledged_and_ignored() {
    let f = fixture();
    let body = r#"{"id":"evt_1","type":"payout.created","data":{"object":{"id":"po_1"}}}"#;
    assert_eq!(f.deliver(body).unwrap(), WebhookOutcome::Ignored);
}

#[test]
fn checkout_completion_marks_the_order_paid() {
    let f = fixture();
    f.seed_store("store_a", "var_1", 10);
    let outcome = f.place_order("store_a", "var_1", 2, 1500);
    let order_id = outcome.primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      3000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::Order { order_id: order_id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  3000,
        latest_charge_id: Some("ch_1".to_string()),
    });

    assert_eq!(f.deliver(&checkout_event("evt_1", "cs_1")).unwrap(), WebhookOutcome::Processed);

    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payments.len(), 1);
    assert_eq!(order.payments[0].provider_payment_id.as_deref(), Some("pi_1"));
    assert_eq!(order.payments[0].amount, 3000);
    // Unfulfilled, so payment alone does not complete the order.
    assert_eq!(order.status, OrderStatus::Open);
}

#[test]
fn webhook_redelivery_inserts_no_second_payment() {
    let f = fixture();
    f.seed_store("store_a", "var_1", 10);
    let order_id = f.place_order("store_a", "var_1", 1, 1000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      1000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::Order { order_id: order_id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  1000,
        latest_charge_id: Some("ch_1".to_string()),
    });

    let body = checkout_event("evt_1", "cs_1");
    assert_eq!(f.deliver(&body).unwrap(), WebhookOutcome::Processed);
    assert_eq!(f.deliver(&body).unwrap(), WebhookOutcome::AlreadyProcessed);
    // Same payment under a fresh event ID is caught by the per-order check.
    assert_eq!(
        f.deliver(&checkout_event("evt_2", "cs_1")).unwrap(),
        WebhookOutcome::AlreadyProcessed
    );

    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.payments.len(), 1);
}

#[test]
fn draft_invoice_payment_completes_the_draft() {
    use crate::implementation::order_management::{DraftLineInput, DraftOrderInput};
    use crate::types::common::Currency;

    let f = fixture();
    f.seed_store("store_a", "var_1", 10);

    let draft = f
        .orders
        .create_draft_order(DraftOrderInput {
            store_id:         StoreId::new("store_a"),
            customer_email:   "buyer@example.com".to_string(),
            currency:         Currency::usd(),
            lines:            vec![DraftLineInput {
                variant_id:        VariantId::new("var_1"),
                listing_id:        None,
                title:             "Widget".to_string(),
                sku:               None,
                quantity:          2,
                unit_price_amount: 1500,
                discount_amount:   0,
            }],
            discount:         None,
            shipping_amount:  500,
            tax_amount:       0,
            shipping_address: Address::default(),
            billing_address:  None,
        })
        .unwrap();

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      3500,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::DraftInvoice { draft_id: draft.id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  3500,
        latest_charge_id: Some("ch_1".to_string()),
    });

    assert_eq!(f.deliver(&checkout_event("evt_1", "cs_1")).unwrap(), WebhookOutcome::Processed);

    let draft = f.orders.get_draft(&draft.id).unwrap();
    assert!(draft.completed);
    let order_id = draft.converted_to_order.unwrap();
    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payments.len(), 1);
    assert_eq!(order.payments[0].provider_payment_id.as_deref(), Some("pi_1"));

    // Completion reserved the stock.
    let location = f.inventory.default_location(&StoreId::new("store_a")).unwrap();
    let level = f.inventory.level_for_variant(&VariantId::new("var_1"), &location.id).unwrap();
    assert_eq!(level.committed, 2);
    assert_eq!(level.available, 8);

    // Redelivery finds the draft completed.
    assert_eq!(
        f.deliver(&checkout_event("evt_2", "cs_1")).unwrap(),
        WebhookOutcome::AlreadyProcessed
    );
}

#[test]
fn multi_store_settlement_transfers_net_of_platform_fee() {
    let f = fixture();
    f.seed_store("store_a", "var_a", 10);
    f.seed_store("store_b", "var_b", 10);
    let order_a = f.place_order("store_a", "var_a", 1, 7000).primary_order_id;
    let order_b = f.place_order("store_b", "var_b", 1, 3000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      10_000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::MultiStore {
            breakdown: vec![
                StoreCharge {
                    store_id:          "store_a".to_string(),
                    amount:            7000,
                    order_ids:         vec![order_a.0.clone()],
                    connected_account: "acct_a".to_string(),
                },
                StoreCharge {
                    store_id:          "store_b".to_string(),
                    amount:            3000,
                    order_ids:         vec![order_b.0.clone()],
                    connected_account: "acct_b".to_string(),
                },
            ],
        },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  10_000,
        latest_charge_id: Some("ch_1".to_string()),
    });

    assert_eq!(f.deliver(&checkout_event("evt_1", "cs_1")).unwrap(), WebhookOutcome::Processed);
    assert_eq!(f.provider.transfer_count(), 2);

    // 5% fee: 7000 -> 350 fee, 6650 net; 3000 -> 150 fee, 2850 net.
    let a = f.orders.get_order(&order_a).unwrap();
    assert_eq!(a.payment_status, PaymentStatus::Paid);
    assert_eq!(a.payments[0].platform_fee_amount, 350);
    assert_eq!(a.payments[0].net_amount, 6650);
    assert_eq!(a.payments[0].transfer_status, TransferStatus::Transferred);

    let b = f.orders.get_order(&order_b).unwrap();
    assert_eq!(b.payments[0].platform_fee_amount, 150);
    assert_eq!(b.payments[0].net_amount, 2850);

    let ledger = f.reconciler.ledger();
    assert_eq!(ledger.balance(&StoreId::new("store_a")).unwrap(), 6650);
    assert_eq!(ledger.balance(&StoreId::new("store_b")).unwrap(), 2850);
}

#[test]
fn one_failed_transfer_does_not_block_other_stores() {
    let f = fixture();
    f.seed_store("store_a", "var_a", 10);
    f.seed_store("store_b", "var_b", 10);
    let order_a = f.place_order("store_a", "var_a", 1, 5000).primary_order_id;
    let order_b = f.place_order("store_b", "var_b", 1, 5000).primary_order_id;
    f.provider.fail_transfers_to("acct_b");

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      10_000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::MultiStore {
            breakdown: vec![
                StoreCharge {
                    store_id:          "store_a".to_string(),
                    amount:            5000,
                    order_ids:         vec![order_a.0.clone()],
                    connected_account: "acct_a".to_string(),
                },
                StoreCharge {
                    store_id:          "store_b".to_string(),
                    amount:            5000,
                    order_ids:         vec![order_b.0.clone()],
                    connected_account: "acct_b".to_string(),
                },
            ],
        },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  10_000,
        latest_charge_id: Some("ch_1".to_string()),
    });

    assert_eq!(f.deliver(&checkout_event("evt_1", "cs_1")).unwrap(), WebhookOutcome::Processed);

    // Store A settled in full.
    let a = f.orders.get_order(&order_a).unwrap();
    assert_eq!(a.payments[0].transfer_status, TransferStatus::Transferred);
    assert_eq!(f.reconciler.ledger().balance(&StoreId::new("store_a")).unwrap(), 4750);

    // Store B's buyer money is captured; the seller transfer stays held
    // and nothing was credited.
    let b = f.orders.get_order(&order_b).unwrap();
    assert_eq!(b.payment_status, PaymentStatus::Paid);
    assert_eq!(b.payments[0].transfer_status, TransferStatus::Held);
    assert_eq!(f.reconciler.ledger().balance(&StoreId::new("store_b")).unwrap(), 0);
}

#[test]
fn multi_store_refund_is_spread_across_the_split() {
    let f = fixture();
    f.seed_store("store_a", "var_a", 10);
    f.seed_store("store_b", "var_b", 10);
    let order_a = f.place_order("store_a", "var_a", 1, 7000).primary_order_id;
    let order_b = f.place_order("store_b", "var_b", 1, 3000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      10_000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::MultiStore {
            breakdown: vec![
                StoreCharge {
                    store_id:          "store_a".to_string(),
                    amount:            7000,
                    order_ids:         vec![order_a.0.clone()],
                    connected_account: "acct_a".to_string(),
                },
                StoreCharge {
                    store_id:          "store_b".to_string(),
                    amount:            3000,
                    order_ids:         vec![order_b.0.clone()],
                    connected_account: "acct_b".to_string(),
                },
            ],
        },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  10_000,
        latest_charge_id: Some("ch_1".to_string()),
    });
    f.deliver(&checkout_event("evt_1", "cs_1")).unwrap();

    // 7000 refunded on the intent so far. Both orders carry pi_1; the
    // total is split by captured share, never dumped on one of them.
    f.provider.seed_refunds(
        "pi_1",
        vec![ProviderRefund { id: "re_1".to_string(), amount: 7000, succeeded: true }],
    );
    assert_eq!(f.deliver(&refund_event("evt_2", "pi_1")).unwrap(), WebhookOutcome::Processed);

    let a = f.orders.get_order(&order_a).unwrap();
    let b = f.orders.get_order(&order_b).unwrap();
    assert_eq!(a.totals.refunded_amount, 4900);
    assert_eq!(b.totals.refunded_amount, 2100);
    assert_eq!(a.payment_status, PaymentStatus::PartiallyRefunded);
    assert_eq!(b.payment_status, PaymentStatus::PartiallyRefunded);

    // Refunded-to-date grows to the full capture: both orders land on
    // exactly their own share.
    f.provider.seed_refunds(
        "pi_1",
        vec![
            ProviderRefund { id: "re_1".to_string(), amount: 7000, succeeded: true },
            ProviderRefund { id: "re_2".to_string(), amount: 3000, succeeded: true },
        ],
    );
    assert_eq!(f.deliver(&refund_event("evt_3", "pi_1")).unwrap(), WebhookOutcome::Processed);

    let a = f.orders.get_order(&order_a).unwrap();
    let b = f.orders.get_order(&order_b).unwrap();
    assert_eq!(a.totals.refunded_amount, 7000);
    assert_eq!(b.totals.refunded_amount, 3000);
    assert_eq!(a.payment_status, PaymentStatus::Refunded);
    assert_eq!(b.payment_status, PaymentStatus::Refunded);
}

#[test]
fn session_in_the_wrong_currency_is_rejected() {
    let f = fixture();
    f.seed_store("store_a", "var_1", 10);
    let order_id = f.place_order("store_a", "var_1", 1, 2000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      2000,
        currency:          "EUR".to_string(),
        purpose:           CheckoutPurpose::Order { order_id: order_id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  2000,
        latest_charge_id: Some("ch_1".to_string()),
    });

    let result = f.deliver(&checkout_event("evt_1", "cs_1"));
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));
    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.payments.is_empty());
}

#[test]
fn full_refund_reverts_a_completed_order() {
    let f = fixture();
    f.seed_store("store_a", "var_1", 10);
    let order_id = f.place_order("store_a", "var_1", 1, 2000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      2000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::Order { order_id: order_id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  2000,
        latest_charge_id: Some("ch_1".to_string()),
    });
    f.deliver(&checkout_event("evt_1", "cs_1")).unwrap();

    // Fulfill everything so the order derives to Completed.
    let processor = FulfillmentProcessor::new(Arc::clone(&f.orders), Arc::clone(&f.inventory));
    let order = f.orders.get_order(&order_id).unwrap();
    let lines = vec![FulfillmentRequestLine {
        order_item_id: order.items[0].id.clone(),
        quantity:      1,
    }];
    processor.fulfill_order(&order_id, &lines, None, None, None).unwrap();
    assert_eq!(f.orders.get_order(&order_id).unwrap().status, OrderStatus::Completed);

    f.provider.seed_refunds(
        "pi_1",
        vec![ProviderRefund { id: "re_1".to_string(), amount: 2000, succeeded: true }],
    );
    assert_eq!(f.deliver(&refund_event("evt_2", "pi_1")).unwrap(), WebhookOutcome::Processed);

    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    assert_eq!(order.totals.refunded_amount, 2000);
    assert_eq!(order.status, OrderStatus::Open);
}

#[test]
fn pending_refunds_do_not_count_toward_the_total() {
    let f = fixture();
    f.seed_store("store_a", "var_1", 10);
    let order_id = f.place_order("store_a", "var_1", 2, 1000).primary_order_id;

    f.provider.seed_session(CheckoutSession {
        id:                "cs_1".to_string(),
        payment_intent_id: "pi_1".to_string(),
        amount_total:      2000,
        currency:          "USD".to_string(),
        purpose:           CheckoutPurpose::Order { order_id: order_id.0.clone() },
    });
    f.provider.seed_intent(PaymentIntent {
        id:               "pi_1".to_string(),
        amount_received:  2000,
        latest_charge_id: Some("ch_1".to_string()),
    });
    f.deliver(&checkout_event("evt_1", "cs_1")).unwrap();

    f.provider.seed_refunds(
        "pi_1",
        vec![
            ProviderRefund { id: "re_1".to_string(), amount: 500, succeeded: true },
            ProviderRefund { id: "re_2".to_string(), amount: 1500, succeeded: false },
        ],
    );
    f.deliver(&refund_event("evt_2", "pi_1")).unwrap();

    let order = f.orders.get_order(&order_id).unwrap();
    assert_eq!(order.totals.refunded_amount, 500);
    assert_eq!(order.payment_status, PaymentStatus::PartiallyRefunded);
}

#[test]
fn seller_ledger_snapshots_running_balance() {
    let ledger = SellerLedger::new();
    let store = StoreId::new("store_a");

    let first = ledger.record_credit(&store, 1000, None, "Settlement").unwrap();
    assert_eq!(first.balance_before, 0);
    assert_eq!(first.balance_after, 1000);

    let second = ledger.record_debit(&store, 400, None, "Payout").unwrap();
    assert_eq!(second.balance_before, 1000);
    assert_eq!(second.balance_after, 600);
    assert_eq!(ledger.balance(&store).unwrap(), 600);

    // Overdrawing fails and leaves the balance untouched.
    assert!(ledger.record_debit(&store, 601, None, "Payout").is_err());
    assert_eq!(ledger.balance(&store).unwrap(), 600);
    assert_eq!(ledger.transactions_for(&store).unwrap().len(), 2);
}
