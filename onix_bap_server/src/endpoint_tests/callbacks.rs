use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use obg_common::Paise;
use onix_bap_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    finalize_confirmed_order,
    protocol::CallbackAction,
    CallbackApi,
    CorrelationStore,
    MemoryStore,
};
use serde_json::{json, Value};

use super::helpers::post_json;
use crate::callback_routes;

const FIXED_ACK: &str = r#"{"message":{"ack":{"status":"ACK"}}}"#;

fn configure(api: CallbackApi) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(callback_routes::on_select)
            .service(callback_routes::on_confirm)
            .service(callback_routes::on_status)
            .app_data(web::Data::new(api));
    }
}

fn callback_body(txid: &str) -> Value {
    json!({
        "context": { "transaction_id": txid, "action": "on_select" },
        "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } }
    })
}

#[actix_web::test]
async fn unsolicited_callbacks_are_still_acknowledged() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = CallbackApi::new(store, EventProducers::default());
    let (status, body) = post_json("/on_status", callback_body("txn-nobody-waits"), &[], configure(api)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::from_str::<Value>(FIXED_ACK).unwrap());
}

#[actix_web::test]
async fn duplicate_callbacks_both_ack_but_only_the_first_resolves() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let pending = store.open("txn-dup", CallbackAction::OnSelect).unwrap();
    let api = CallbackApi::new(store.clone(), EventProducers::default());

    let app = test::init_service(App::new().configure(configure(api))).await;
    for _ in 0..2 {
        let request = test::TestRequest::post().uri("/on_select").set_json(callback_body("txn-dup")).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body, serde_json::from_str::<Value>(FIXED_ACK).unwrap());
    }
    assert_eq!(store.count(), 0);
    // the waiting caller saw exactly the first payload
    assert!(pending.wait().await.is_ok());
}

#[actix_web::test]
async fn unreadable_callback_bodies_are_acknowledged_and_dropped() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let api = CallbackApi::new(store, EventProducers::default());
    let app = test::init_service(App::new().configure(configure(api))).await;
    let request = test::TestRequest::post().uri("/on_select").set_payload("this is not json").to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body, serde_json::from_str::<Value>(FIXED_ACK).unwrap());
}

#[actix_web::test]
async fn on_confirm_settles_the_total_quantity() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let memory = MemoryStore::new();
    let mut hooks = EventHooks::default();
    {
        let memory = memory.clone();
        hooks.on_order_confirmed(move |event| {
            let memory = memory.clone();
            Box::pin(async move {
                finalize_confirmed_order(event, &memory, &memory, &NullNotifier, Paise::from(150)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    }
    let handlers = EventHandlers::new(4, hooks);
    let api = CallbackApi::new(store, handlers.producers());
    handlers.start_handlers().await;

    let body = json!({
        "context": { "transaction_id": "txn-settle", "action": "on_confirm" },
        "message": { "order": {
            "items": [
                { "id": "solar-surplus", "quantity": 5, "price": { "currency": "INR", "value": "4.25" } },
                { "id": "solar-surplus", "quantity": 10, "price": { "currency": "INR", "value": "4.25" } },
                { "id": "solar-surplus", "quantity": 3, "price": { "currency": "INR", "value": "4.25" } }
            ],
            "buyerAttributes": { "platformId": "buyer-platform", "domainId": "ca-001122" },
            "providerAttributes": { "platformId": "seller-platform", "domainId": "feeder-7" }
        } }
    });
    let (status, _) = post_json("/on_confirm", body, &[], configure(api)).await;
    assert_eq!(status, StatusCode::OK);

    let mut waited = 0;
    while memory.settlements().is_empty() && waited < 500 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    let settlements = memory.settlements();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].quantity, 18);
    assert_eq!(settlements[0].counterparty_platform_id, "seller-platform");
}

/// Notifier that swallows everything; the settlement assertion is the point here.
struct NullNotifier;

impl onix_bap_engine::traits::Notifier for NullNotifier {
    async fn send_confirmation(
        &self,
        _transaction_id: &str,
        _order: &onix_bap_engine::protocol::Order,
    ) -> Result<(), onix_bap_engine::traits::NotifyError> {
        Ok(())
    }
}
