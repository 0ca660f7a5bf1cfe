//! Inbound callback endpoints, one per asynchronous result type.
//!
//! Whatever arrives here — matched, duplicate, unsolicited, or unreadable — the sender receives
//! the same fixed ACK body. Signalling rejection would only trigger counterparty retry storms,
//! and a payload nobody waits for anymore is not the sender's problem.

use actix_web::{post, web, HttpResponse};
use log::*;
use onix_bap_engine::{
    protocol::{CallbackAction, CallbackEnvelope},
    CallbackApi,
};

use crate::data_objects::CallbackAck;

#[post("/on_select")]
pub async fn on_select(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnSelect, body, &api).await
}

#[post("/on_init")]
pub async fn on_init(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnInit, body, &api).await
}

#[post("/on_confirm")]
pub async fn on_confirm(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnConfirm, body, &api).await
}

#[post("/on_status")]
pub async fn on_status(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnStatus, body, &api).await
}

#[post("/on_update")]
pub async fn on_update(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnUpdate, body, &api).await
}

#[post("/on_rating")]
pub async fn on_rating(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnRating, body, &api).await
}

#[post("/on_support")]
pub async fn on_support(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnSupport, body, &api).await
}

#[post("/on_track")]
pub async fn on_track(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnTrack, body, &api).await
}

#[post("/on_cancel")]
pub async fn on_cancel(body: web::Bytes, api: web::Data<CallbackApi>) -> HttpResponse {
    handle(CallbackAction::OnCancel, body, &api).await
}

async fn handle(action: CallbackAction, body: web::Bytes, api: &CallbackApi) -> HttpResponse {
    trace!("📨️ Received {action} callback ({} bytes)", body.len());
    match serde_json::from_slice::<CallbackEnvelope>(&body) {
        Ok(envelope) => {
            api.process_callback(action, envelope).await;
        },
        Err(e) => warn!("📨️ Discarding unreadable {action} callback. {e}"),
    }
    HttpResponse::Ok().json(CallbackAck::ack())
}
