//! End-to-end flows through the bridge: gateway dispatch, callback resolution, timeout, and
//! confirmation finalization, with the upstream counterparty stubbed out.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use obg_common::Paise;
use onix_bap_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    finalize_confirmed_order,
    normalizer::EnvelopeSettings,
    protocol::{CallbackAction, CallbackEnvelope, CanonicalEnvelope, Order, ProtocolAction},
    traits::{BuyerProfile, Notifier, NotifyError, OrderStore, ProfileLookup, ProfileLookupError},
    upstream::{UpstreamApi, UpstreamApiError},
    BridgeError,
    CallbackApi,
    CorrelationStore,
    GatewayApi,
    MemoryStore,
    RequestNormalizer,
};
use serde_json::{json, Value};

//-------------------------------------------  Test doubles  ----------------------------------------------------------

struct StaticProfiles(Option<BuyerProfile>);

impl ProfileLookup for StaticProfiles {
    async fn find_verified_buyer(&self, _id: &str) -> Result<Option<BuyerProfile>, ProfileLookupError> {
        Ok(self.0.clone())
    }
}

/// Upstream stub replying with a canned value and counting dispatches.
#[derive(Clone)]
struct CannedUpstream {
    reply: Value,
    calls: Arc<AtomicUsize>,
}

impl CannedUpstream {
    fn acking() -> Self {
        Self { reply: json!({"message": {"ack": {"status": "ACK"}}}), calls: Arc::new(AtomicUsize::new(0)) }
    }

    fn replying(reply: Value) -> Self {
        Self { reply, calls: Arc::new(AtomicUsize::new(0)) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UpstreamApi for CannedUpstream {
    async fn dispatch(
        &self,
        _action: ProtocolAction,
        _envelope: &CanonicalEnvelope,
    ) -> Result<Value, UpstreamApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

#[derive(Clone, Default)]
struct CountingNotifier {
    sent: Arc<AtomicUsize>,
}

impl Notifier for CountingNotifier {
    async fn send_confirmation(&self, _transaction_id: &str, _order: &Order) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//-------------------------------------------  Fixtures  --------------------------------------------------------------

fn settings() -> EnvelopeSettings {
    EnvelopeSettings {
        domain: "uei:p2p_trading".to_string(),
        version: "1.1.0".to_string(),
        bap_id: "bap.example.org".to_string(),
        bap_uri: "https://bap.example.org".to_string(),
        ttl: Some("PT30S".to_string()),
    }
}

fn gateway(
    store: &CorrelationStore,
    upstream: CannedUpstream,
) -> Arc<GatewayApi<StaticProfiles, CannedUpstream>> {
    let profiles = Arc::new(StaticProfiles(Some(BuyerProfile {
        subscriber_id: "user-7".to_string(),
        platform_id: "buyer-platform".to_string(),
        domain_id: "ca-001122".to_string(),
        verified: true,
    })));
    let normalizer = RequestNormalizer::new(profiles, settings(), Paise::from(150));
    Arc::new(GatewayApi::new(normalizer, store.clone(), upstream))
}

fn canonical_select(txid: &str) -> onix_bap_engine::GatewayRequestBody {
    serde_json::from_value(json!({
        "context": { "transaction_id": txid },
        "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } }
    }))
    .unwrap()
}

fn callback(txid: &str) -> CallbackEnvelope {
    serde_json::from_value(json!({
        "context": { "transaction_id": txid, "action": "on_select" },
        "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } }
    }))
    .unwrap()
}

async fn wait_for_pending(store: &CorrelationStore) {
    let mut waited = 0;
    while store.count() == 0 && waited < 500 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    assert!(store.count() > 0, "no correlation was registered within the grace period");
}

//-------------------------------------------  Scenarios  -------------------------------------------------------------

#[tokio::test]
async fn select_completes_when_the_callback_arrives() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = gateway(&store, CannedUpstream::acking());
    let callbacks = CallbackApi::new(store.clone(), EventProducers::default());

    let call = {
        let api = api.clone();
        tokio::spawn(async move { api.execute(ProtocolAction::Select, canonical_select("txn-1"), None).await })
    };
    wait_for_pending(&store).await;
    callbacks.process_callback(CallbackAction::OnSelect, callback("txn-1")).await;

    let success = call.await.unwrap().unwrap();
    assert_eq!(success.transaction_id, "txn-1");
    assert!(success.data.order().is_some());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn select_times_out_when_no_callback_arrives() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_millis(50));
    let api = gateway(&store, CannedUpstream::acking());

    let err = api.execute(ProtocolAction::Select, canonical_select("txn-2"), None).await.unwrap_err();
    match err {
        BridgeError::Timeout { action, window_ms } => {
            assert_eq!(action, CallbackAction::OnSelect);
            assert_eq!(window_ms, 50);
        },
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn a_nack_cancels_the_pending_transaction() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let upstream = CannedUpstream::replying(json!({
        "message": { "ack": { "status": "NACK" } },
        "error": { "code": "40002", "message": "Catalogue expired" }
    }));
    let api = gateway(&store, upstream);

    let err = api.execute(ProtocolAction::Select, canonical_select("txn-3"), None).await.unwrap_err();
    match err {
        BridgeError::UpstreamRejected { error, .. } => {
            assert_eq!(error.code.as_deref(), Some("40002"));
        },
        other => panic!("expected an upstream rejection, got {other:?}"),
    }
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn an_unclassifiable_reply_is_treated_as_a_rejection() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = gateway(&store, CannedUpstream::replying(json!(42)));

    let err = api.execute(ProtocolAction::Select, canonical_select("txn-4"), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::UpstreamRejected { .. }));
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn a_business_error_in_the_callback_is_surfaced() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = gateway(&store, CannedUpstream::acking());
    let callbacks = CallbackApi::new(store.clone(), EventProducers::default());

    let call = {
        let api = api.clone();
        tokio::spawn(async move { api.execute(ProtocolAction::Select, canonical_select("txn-5"), None).await })
    };
    wait_for_pending(&store).await;
    let mut envelope = callback("txn-5");
    envelope.error = Some(serde_json::from_value(json!({ "code": "50001", "message": "Item no longer offered" })).unwrap());
    callbacks.process_callback(CallbackAction::OnSelect, envelope).await;

    let err = call.await.unwrap().unwrap_err();
    match err {
        BridgeError::Business { error } => assert_eq!(error.code.as_deref(), Some("50001")),
        other => panic!("expected a business error, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthenticated_catalog_select_never_reaches_upstream() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let upstream = CannedUpstream::acking();
    let api = gateway(&store, upstream.clone());
    let body = serde_json::from_value(json!({
        "catalogue": {
            "items": [{ "id": "solar-surplus" }],
            "offers": [{ "id": "offer-1", "itemIds": ["solar-surplus"], "price": { "currency": "INR", "value": "4.25" } }]
        },
        "customAttributes": { "quantity": 5 }
    }))
    .unwrap();

    let err = api.execute(ProtocolAction::Select, body, None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Unauthorized));
    assert_eq!(upstream.call_count(), 0);
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn confirm_callback_finalizes_exactly_one_settlement() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let memory = MemoryStore::new();
    let notifier = CountingNotifier::default();

    let mut hooks = EventHooks::default();
    {
        let memory = memory.clone();
        let notifier = notifier.clone();
        hooks.on_order_confirmed(move |event| {
            let memory = memory.clone();
            let notifier = notifier.clone();
            Box::pin(async move {
                finalize_confirmed_order(event, &memory, &memory, &notifier, Paise::from(150)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    }
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let callbacks = CallbackApi::new(store.clone(), producers);

    let confirm_callback: CallbackEnvelope = serde_json::from_value(json!({
        "context": { "transaction_id": "txn-6", "action": "on_confirm" },
        "message": { "order": {
            "items": [
                { "id": "solar-surplus", "quantity": 5, "price": { "currency": "INR", "value": "4.25" } },
                { "id": "solar-surplus", "quantity": 10, "price": { "currency": "INR", "value": "4.25" } },
                { "id": "solar-surplus", "quantity": 3, "price": { "currency": "INR", "value": "4.25" } }
            ],
            "buyerAttributes": { "platformId": "buyer-platform", "domainId": "ca-001122" },
            "providerAttributes": { "platformId": "seller-platform", "domainId": "feeder-7" }
        } }
    }))
    .unwrap();

    // duplicate delivery: the second must not double-book
    callbacks.process_callback(CallbackAction::OnConfirm, confirm_callback.clone()).await;
    callbacks.process_callback(CallbackAction::OnConfirm, confirm_callback).await;

    let mut waited = 0;
    while memory.settlements().is_empty() && waited < 500 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    // give the duplicate a moment to (wrongly) land before asserting
    tokio::time::sleep(Duration::from_millis(50)).await;

    let settlements = memory.settlements();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].quantity, 18);
    assert_eq!(settlements[0].item_ref, "solar-surplus");
    assert_eq!(settlements[0].counterparty_platform_id, "seller-platform");
    assert_eq!(memory.order_count(), 1);
    let record = memory.fetch_order("txn-6").await.unwrap().unwrap();
    // 18 units × 4.25 + 18 × 1.50 wheeling
    assert_eq!(record.total_cost, Paise::from(18 * 425 + 18 * 150));
}

#[tokio::test]
async fn confirm_callback_with_error_skips_finalization() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let memory = MemoryStore::new();
    let notifier = CountingNotifier::default();
    let mut hooks = EventHooks::default();
    {
        let memory = memory.clone();
        let notifier = notifier.clone();
        hooks.on_order_confirmed(move |event| {
            let memory = memory.clone();
            let notifier = notifier.clone();
            Box::pin(async move {
                finalize_confirmed_order(event, &memory, &memory, &notifier, Paise::from(150)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    }
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let callbacks = CallbackApi::new(store.clone(), producers);

    let envelope: CallbackEnvelope = serde_json::from_value(json!({
        "context": { "transaction_id": "txn-7" },
        "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } },
        "error": { "code": "60001", "message": "Provider withdrew the offer" }
    }))
    .unwrap();
    callbacks.process_callback(CallbackAction::OnConfirm, envelope).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(memory.settlements().is_empty());
    assert_eq!(memory.order_count(), 0);
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_select_transactions_are_rejected() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = gateway(&store, CannedUpstream::acking());

    let first = {
        let api = api.clone();
        tokio::spawn(async move { api.execute(ProtocolAction::Select, canonical_select("txn-8"), None).await })
    };
    wait_for_pending(&store).await;
    let err = api.execute(ProtocolAction::Select, canonical_select("txn-8"), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::DuplicateTransaction(id) if id == "txn-8"));

    // the first caller is still waiting; release it
    let callbacks = CallbackApi::new(store.clone(), EventProducers::default());
    callbacks.process_callback(CallbackAction::OnSelect, callback("txn-8")).await;
    assert!(first.await.unwrap().is_ok());
}
