//! HTTP client for the upstream ONIX BAP adapter.
//!
//! Each synchronous action is forwarded as `POST <base>/<action>` with the canonical envelope.
//! The adapter's 2xx reply is handed back raw (as parsed JSON, or as a string when the body is
//! not valid JSON) so the ack classifier can deal with degraded shapes; non-2xx replies and
//! transport failures are classified here.

use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{CanonicalEnvelope, ProtocolAction, ProtocolError};

#[derive(Debug, Clone, Error)]
pub enum UpstreamApiError {
    #[error("The ONIX BAP returned HTTP {status}. {error}")]
    Gateway { status: u16, error: ProtocolError },
    #[error("Could not reach the ONIX BAP. {0}")]
    Network(String),
    #[error("Could not initialize the upstream client. {0}")]
    Initialization(String),
}

#[allow(async_fn_in_trait)]
pub trait UpstreamApi {
    /// Forwards one canonical envelope and returns the synchronous reply body.
    async fn dispatch(&self, action: ProtocolAction, envelope: &CanonicalEnvelope)
        -> Result<Value, UpstreamApiError>;
}

#[derive(Clone)]
pub struct OnixBapClient {
    base_url: String,
    client: Arc<Client>,
}

impl OnixBapClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamApiError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl UpstreamApi for OnixBapClient {
    async fn dispatch(
        &self,
        action: ProtocolAction,
        envelope: &CanonicalEnvelope,
    ) -> Result<Value, UpstreamApiError> {
        let url = format!("{}/{}", self.base_url, action.as_str());
        trace!("📡️ POST {url} [{}]", envelope.context.transaction_id);
        let response =
            self.client.post(&url).json(envelope).send().await.map_err(|e| UpstreamApiError::Network(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| UpstreamApiError::Network(e.to_string()))?;
        if status.is_success() {
            trace!("📡️ {url} replied {status}");
            // A degraded adapter sometimes replies with a bare string. Pass it through untouched;
            // the ack classifier knows what to do with it.
            Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
        } else {
            debug!("📡️ {url} replied {status}: {body}");
            Err(UpstreamApiError::Gateway { status: status.as_u16(), error: extract_gateway_error(&body, status) })
        }
    }
}

/// Pulls the most useful error description out of a failed reply: a structured `message.error`
/// object, a plain `error` string, or the bare HTTP status text, in that order of preference.
fn extract_gateway_error(body: &str, status: StatusCode) -> ProtocolError {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(structured) = parsed.pointer("/message/error") {
            if let Ok(error) = serde_json::from_value::<ProtocolError>(structured.clone()) {
                return error;
            }
        }
        if let Some(plain) = parsed.get("error").and_then(Value::as_str) {
            return ProtocolError::from_message(plain);
        }
    }
    ProtocolError::from_message(status.canonical_reason().unwrap_or("upstream error"))
}
