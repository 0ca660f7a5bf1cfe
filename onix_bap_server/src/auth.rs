//! Caller identity extraction.
//!
//! Token verification happens in the authenticating proxy fronting this service; by the time a
//! request arrives here, the verified subscriber id is in the `x-onix-subscriber` header. Routes
//! that can also serve anonymous callers extract `Option<CallerIdentity>` and let the normalizer
//! decide whether the shape at hand needs an identity.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::errors::ServerError;

pub const SUBSCRIBER_ID_HEADER: &str = "x-onix-subscriber";

#[derive(Clone, Debug)]
pub struct CallerIdentity {
    pub subscriber_id: String,
}

impl FromRequest for CallerIdentity {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let subscriber = req
            .headers()
            .get(SUBSCRIBER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        ready(subscriber.map(|subscriber_id| Self { subscriber_id }).ok_or(ServerError::MissingCallerIdentity))
    }
}
