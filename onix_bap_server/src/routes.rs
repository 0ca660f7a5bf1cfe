//! Request handler definitions for the synchronous action endpoints.
//!
//! Handlers are generic over the collaborator traits so that endpoint tests can drop in mocks.
//! Since actix-web cannot register generic handlers through its attribute macros, routes are
//! declared with the `route!` macro, which pairs each handler with a `*Route` service factory
//! parameterized over the same trait bounds.
//!
//! Action handlers suspend until the matching callback arrives or the wait expires — that is the
//! whole point of the gateway — so they are async all the way down and never block a worker.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use onix_bap_engine::{
    normalizer::GatewayRequestBody,
    protocol::ProtocolAction,
    traits::ProfileLookup,
    upstream::UpstreamApi,
    CorrelationStore,
    GatewayApi,
};

use crate::{
    auth::CallerIdentity,
    data_objects::{GatewayResponse, HealthResponse, UpstreamInfo},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so the registration is implemented manually via
// the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  -----------------------------------------------------------

#[get("/health")]
pub async fn health(store: web::Data<CorrelationStore>, upstream: web::Data<UpstreamInfo>) -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(HealthResponse::ok(store.count(), upstream.onix_bap_url.clone()))
}

// ----------------------------------------------   Actions  ----------------------------------------------------------

route!(select => Post "/select" impl ProfileLookup, UpstreamApi);
pub async fn select<P, U>(
    body: web::Json<GatewayRequestBody>,
    identity: Option<CallerIdentity>,
    api: web::Data<GatewayApi<P, U>>,
) -> Result<HttpResponse, ServerError>
where
    P: ProfileLookup + 'static,
    U: UpstreamApi + 'static,
{
    run_action(ProtocolAction::Select, body, identity, api).await
}

route!(init => Post "/init" impl ProfileLookup, UpstreamApi);
pub async fn init<P, U>(
    body: web::Json<GatewayRequestBody>,
    identity: Option<CallerIdentity>,
    api: web::Data<GatewayApi<P, U>>,
) -> Result<HttpResponse, ServerError>
where
    P: ProfileLookup + 'static,
    U: UpstreamApi + 'static,
{
    run_action(ProtocolAction::Init, body, identity, api).await
}

route!(confirm => Post "/confirm" impl ProfileLookup, UpstreamApi);
pub async fn confirm<P, U>(
    body: web::Json<GatewayRequestBody>,
    identity: Option<CallerIdentity>,
    api: web::Data<GatewayApi<P, U>>,
) -> Result<HttpResponse, ServerError>
where
    P: ProfileLookup + 'static,
    U: UpstreamApi + 'static,
{
    run_action(ProtocolAction::Confirm, body, identity, api).await
}

route!(status => Post "/status" impl ProfileLookup, UpstreamApi);
pub async fn status<P, U>(
    body: web::Json<GatewayRequestBody>,
    identity: Option<CallerIdentity>,
    api: web::Data<GatewayApi<P, U>>,
) -> Result<HttpResponse, ServerError>
where
    P: ProfileLookup + 'static,
    U: UpstreamApi + 'static,
{
    run_action(ProtocolAction::Status, body, identity, api).await
}

async fn run_action<P, U>(
    action: ProtocolAction,
    body: web::Json<GatewayRequestBody>,
    identity: Option<CallerIdentity>,
    api: web::Data<GatewayApi<P, U>>,
) -> Result<HttpResponse, ServerError>
where
    P: ProfileLookup + 'static,
    U: UpstreamApi + 'static,
{
    trace!("💻️ Received {action} request");
    let caller = identity.as_ref().map(|c| c.subscriber_id.as_str());
    let success = api.execute(action, body.into_inner(), caller).await?;
    debug!("💻️ {action} [{}] answered", success.transaction_id);
    Ok(HttpResponse::Ok().json(GatewayResponse::from(success)))
}
