use std::{sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use obg_common::Paise;
use onix_bap_engine::{
    events::EventProducers,
    normalizer::EnvelopeSettings,
    CallbackApi,
    CorrelationStore,
    GatewayApi,
    RequestNormalizer,
};
use serde_json::{json, Value};

use super::{
    helpers::{get_json, post_json},
    mocks::{MockProfiles, MockUpstream},
};
use crate::{
    auth::SUBSCRIBER_ID_HEADER,
    callback_routes,
    data_objects::UpstreamInfo,
    routes,
    routes::{ConfirmRoute, SelectRoute},
};

fn settings() -> EnvelopeSettings {
    EnvelopeSettings {
        domain: "uei:p2p_trading".to_string(),
        version: "1.1.0".to_string(),
        bap_id: "bap.example.org".to_string(),
        bap_uri: "https://bap.example.org".to_string(),
        ttl: Some("PT30S".to_string()),
    }
}

fn configure(
    profiles: MockProfiles,
    upstream: MockUpstream,
    store: CorrelationStore,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let normalizer = RequestNormalizer::new(Arc::new(profiles), settings(), Paise::from(150));
        let api = GatewayApi::new(normalizer, store.clone(), upstream);
        cfg.service(SelectRoute::<MockProfiles, MockUpstream>::new())
            .service(ConfirmRoute::<MockProfiles, MockUpstream>::new())
            .service(routes::health)
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(store))
            .app_data(web::Data::new(UpstreamInfo { onix_bap_url: "https://onix.example.org".to_string() }));
    }
}

fn catalog_select_body() -> Value {
    json!({
        "catalogue": {
            "providerAttributes": { "platformId": "seller-platform", "domainId": "feeder-7" },
            "items": [{ "id": "solar-surplus" }],
            "offers": [
                { "id": "offer-1", "itemIds": ["solar-surplus"], "price": { "currency": "INR", "value": "4.25" } }
            ]
        },
        "customAttributes": { "quantity": 5 }
    })
}

fn canonical_select_body(txid: &str) -> Value {
    json!({
        "context": { "transaction_id": txid },
        "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } }
    })
}

fn ack_reply() -> Value {
    json!({"message": {"ack": {"status": "ACK"}}})
}

#[actix_web::test]
async fn catalog_select_without_identity_is_unauthorized() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    // no expectations: the profile service and the upstream must never be contacted
    let (status, body) =
        post_json("/select", catalog_select_body(), &[], configure(MockProfiles::new(), MockUpstream::new(), store))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn catalog_select_without_verified_profile_is_forbidden() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let mut profiles = MockProfiles::new();
    profiles.expect_find_verified_buyer().returning(|_| Ok(None));
    let (status, body) = post_json(
        "/select",
        catalog_select_body(),
        &[(SUBSCRIBER_ID_HEADER, "user-7")],
        configure(profiles, MockUpstream::new(), store),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NO_BUYER_PROFILE");
}

#[actix_web::test]
async fn a_nacked_select_returns_bad_request_and_leaves_nothing_pending() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let mut upstream = MockUpstream::new();
    upstream.expect_dispatch().returning(|_, _| {
        Ok(json!({
            "message": { "ack": { "status": "NACK" } },
            "error": { "code": "40002", "message": "Catalogue expired" }
        }))
    });
    let (status, body) = post_json(
        "/select",
        canonical_select_body("txn-nack"),
        &[],
        configure(MockProfiles::new(), upstream, store.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "40002");
    assert_eq!(store.count(), 0);
}

#[actix_web::test]
async fn confirm_without_buyer_attributes_is_rejected() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let body = json!({
        "context": { "transaction_id": "txn-c1" },
        "message": { "order": {
            "items": [{ "id": "solar-surplus", "quantity": 5 }],
            "providerAttributes": { "platformId": "seller-platform", "domainId": "feeder-7" }
        } }
    });
    let (status, body) =
        post_json("/confirm", body, &[], configure(MockProfiles::new(), MockUpstream::new(), store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    assert!(body["error"]["message"].as_str().unwrap().contains("buyerAttributes"));
}

#[actix_web::test]
async fn health_reports_pending_transactions_and_upstream() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let _pending = store.open("txn-health", onix_bap_engine::protocol::CallbackAction::OnSelect).unwrap();
    let (status, body) =
        get_json("/health", configure(MockProfiles::new(), MockUpstream::new(), store.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["pendingTransactions"], 1);
    assert_eq!(body["onixBapUrl"], "https://onix.example.org");
}

#[actix_web::test]
async fn select_answers_once_the_callback_arrives() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_secs(5));
    let mut upstream = MockUpstream::new();
    upstream.expect_dispatch().returning(|_, _| Ok(ack_reply()));
    let callback_api = CallbackApi::new(store.clone(), EventProducers::default());

    let app = test::init_service(
        App::new()
            .configure(configure(MockProfiles::new(), upstream, store.clone()))
            .app_data(web::Data::new(callback_api))
            .service(callback_routes::on_select),
    )
    .await;

    let select = test::TestRequest::post().uri("/select").set_json(canonical_select_body("txn-e2e")).to_request();
    let select_call = test::call_service(&app, select);
    let callback_call = async {
        // wait until the gateway has parked the transaction, then deliver the result
        while store.count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let callback = test::TestRequest::post()
            .uri("/on_select")
            .set_json(json!({
                "context": { "transaction_id": "txn-e2e", "action": "on_select" },
                "message": { "order": { "items": [{ "id": "solar-surplus", "quantity": 5 }] } }
            }))
            .to_request();
        test::call_service(&app, callback).await
    };
    let (select_response, callback_response) = futures::join!(select_call, callback_call);

    assert_eq!(callback_response.status(), StatusCode::OK);
    assert_eq!(select_response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(select_response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction_id"], "txn-e2e");
    assert_eq!(body["data"]["message"]["order"]["items"][0]["quantity"], 5);
    assert_eq!(store.count(), 0);
}

#[actix_web::test]
async fn select_times_out_with_504_when_no_callback_arrives() {
    let _ = env_logger::try_init();
    let store = CorrelationStore::new(Duration::from_millis(50));
    let mut upstream = MockUpstream::new();
    upstream.expect_dispatch().returning(|_, _| Ok(ack_reply()));
    let (status, body) = post_json(
        "/select",
        canonical_select_body("txn-slow"),
        &[],
        configure(MockProfiles::new(), upstream, store.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "CALLBACK_TIMEOUT");
    assert!(body["error"]["message"].as_str().unwrap().contains("on_select"));
    assert_eq!(store.count(), 0);
}
