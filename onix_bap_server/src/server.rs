use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::future::{ok, Either};
use log::*;
use onix_bap_engine::{
    events::{EventHandlers, EventHooks},
    finalize_confirmed_order,
    traits::ProfileLookup,
    upstream::UpstreamApi,
    CallbackApi,
    CorrelationStore,
    GatewayApi,
    MemoryStore,
    OnixBapClient,
    RequestNormalizer,
};

use crate::{
    callback_routes,
    config::ServerConfig,
    data_objects::UpstreamInfo,
    errors::ServerError,
    helpers::remote_ip,
    integrations::{HttpProfileLookup, WebhookNotifier},
    routes,
    routes::{ConfirmRoute, InitRoute, SelectRoute, StatusRoute},
};

const EVENT_BUFFER_SIZE: usize = 16;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let store = CorrelationStore::new(config.callback_timeout);
    let upstream = OnixBapClient::new(&config.onix_bap_url, config.upstream_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let profiles = Arc::new(
        HttpProfileLookup::new(&config.profile_service).map_err(|e| ServerError::InitializeError(e.to_string()))?,
    );
    let orders = MemoryStore::new();
    let notifier = WebhookNotifier::new(config.notify_webhook_url.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    // Finalization runs on a detached handler task, off the callback acknowledgement path.
    let mut hooks = EventHooks::default();
    {
        let orders = orders.clone();
        let notifier = notifier.clone();
        let wheeling_charge = config.wheeling_charge;
        hooks.on_order_confirmed(move |event| {
            let orders = orders.clone();
            let notifier = notifier.clone();
            Box::pin(async move {
                finalize_confirmed_order(event, &orders, &orders, &notifier, wheeling_charge).await;
            })
        });
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let callback_api = CallbackApi::new(store.clone(), handlers.producers());
    handlers.start_handlers().await;

    let srv = create_server_instance(config, store, profiles, upstream, callback_api)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<P, U>(
    config: ServerConfig,
    store: CorrelationStore,
    profiles: Arc<P>,
    upstream: U,
    callback_api: CallbackApi,
) -> Result<Server, ServerError>
where
    P: ProfileLookup + Send + Sync + 'static,
    U: UpstreamApi + Clone + Send + Sync + 'static,
{
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let normalizer = RequestNormalizer::new(profiles.clone(), config.envelope_settings(), config.wheeling_charge);
        let gateway_api = GatewayApi::new(normalizer, store.clone(), upstream.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("obg::access_log"))
            .app_data(web::Data::new(gateway_api))
            .app_data(web::Data::new(callback_api.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(UpstreamInfo { onix_bap_url: config.onix_bap_url.clone() }));
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.callback_whitelist.clone();
        let callback_scope = web::scope("")
            .wrap_fn(move |req, srv| {
                let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
                let peer_ip = remote_ip(req.headers(), peer_addr.as_deref(), use_x_forwarded_for, use_forwarded);
                let allowed = match (&whitelist, peer_ip) {
                    (None, _) => true,
                    (Some(whitelist), Some(ip)) => {
                        trace!("📨️ Inbound callback from {ip}");
                        whitelist.contains(&ip)
                    },
                    (Some(_), None) => {
                        warn!("📨️ No peer address found on inbound callback request, denying access.");
                        false
                    },
                };
                if allowed {
                    Either::Left(srv.call(req))
                } else {
                    Either::Right(ok(req.error_response(ServerError::ForbiddenCallbackPeer)))
                }
            })
            .service(callback_routes::on_select)
            .service(callback_routes::on_init)
            .service(callback_routes::on_confirm)
            .service(callback_routes::on_status)
            .service(callback_routes::on_update)
            .service(callback_routes::on_rating)
            .service(callback_routes::on_support)
            .service(callback_routes::on_track)
            .service(callback_routes::on_cancel);
        app.service(routes::health)
            .service(SelectRoute::<P, U>::new())
            .service(InitRoute::<P, U>::new())
            .service(ConfirmRoute::<P, U>::new())
            .service(StatusRoute::<P, U>::new())
            .service(callback_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
