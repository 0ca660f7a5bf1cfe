//! The synchronous face of the bridge: drives one protocol action end-to-end.
//!
//! One invocation is one strict sequence — normalize, dispatch, register the correlation, classify
//! the synchronous acknowledgement, then suspend on the correlation's future until the callback
//! receiver resolves it or the expiry timer wins. The correlation is never opened before the
//! counterparty has answered the dispatch, so a request that dies in transit leaves nothing
//! pending behind it.

use std::fmt::Debug;

use log::*;
use serde_json::Value;
use thiserror::Error;

use crate::{
    ack::{classify_ack, AckStatus},
    correlation::{CorrelationError, CorrelationStore},
    normalizer::{GatewayRequestBody, NormalizeError, RequestNormalizer},
    protocol::{CallbackAction, CallbackEnvelope, ProtocolAction, ProtocolError},
    traits::ProfileLookup,
    upstream::{UpstreamApi, UpstreamApiError},
};

#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Validation(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("This request shape requires an authenticated caller")]
    Unauthorized,
    #[error("No verified buyer profile exists for this caller")]
    NoBuyerProfile,
    #[error("Buyer profile lookup failed: {0}")]
    ProfileLookup(String),
    #[error("A transaction with id {0} is already awaiting a callback")]
    DuplicateTransaction(String),
    #[error("Timeout waiting for {action} callback ({window_ms}ms)")]
    Timeout { action: CallbackAction, window_ms: u64 },
    #[error("The {action} request was not accepted by the ONIX BAP. {error}")]
    UpstreamRejected { action: ProtocolAction, error: ProtocolError },
    #[error("The ONIX BAP returned HTTP {status}. {error}")]
    Upstream { status: u16, error: ProtocolError },
    #[error("The counterparty reported an error. {error}")]
    Business { error: ProtocolError },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NormalizeError> for BridgeError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::Validation(msg) => Self::Validation(msg),
            NormalizeError::MissingField(field) => Self::MissingField(field),
            NormalizeError::Unauthorized => Self::Unauthorized,
            NormalizeError::NoBuyerProfile => Self::NoBuyerProfile,
            NormalizeError::ProfileLookup(msg) => Self::ProfileLookup(msg),
        }
    }
}

impl From<CorrelationError> for BridgeError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::Duplicate(id) => Self::DuplicateTransaction(id),
            CorrelationError::Timeout { action, window_ms } => Self::Timeout { action, window_ms },
            CorrelationError::Cancelled(id) => {
                Self::Internal(format!("The wait for transaction {id} was cancelled unexpectedly"))
            },
        }
    }
}

impl From<UpstreamApiError> for BridgeError {
    fn from(e: UpstreamApiError) -> Self {
        match e {
            UpstreamApiError::Gateway { status, error } => Self::Upstream { status, error },
            UpstreamApiError::Network(msg) => Self::Internal(msg),
            UpstreamApiError::Initialization(msg) => Self::Internal(msg),
        }
    }
}

/// The payload a completed action hands back to the HTTP layer.
#[derive(Clone, Debug)]
pub struct ActionSuccess {
    pub transaction_id: String,
    pub data: CallbackEnvelope,
}

/// `GatewayApi` is the primary API for executing synchronous protocol actions against the
/// asynchronous upstream.
pub struct GatewayApi<P, U> {
    normalizer: RequestNormalizer<P>,
    store: CorrelationStore,
    upstream: U,
}

impl<P, U> Debug for GatewayApi<P, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayApi")
    }
}

impl<P, U> GatewayApi<P, U> {
    pub fn new(normalizer: RequestNormalizer<P>, store: CorrelationStore, upstream: U) -> Self {
        Self { normalizer, store, upstream }
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }
}

impl<P, U> GatewayApi<P, U>
where
    P: ProfileLookup,
    U: UpstreamApi,
{
    /// Executes one action: returns once the matching callback has arrived, the wait has expired,
    /// or the request was rejected on the way in.
    pub async fn execute(
        &self,
        action: ProtocolAction,
        body: GatewayRequestBody,
        caller: Option<&str>,
    ) -> Result<ActionSuccess, BridgeError> {
        let envelope = self.normalizer.normalize(action, body, caller).await?;
        let txid = envelope.context.transaction_id.clone();
        debug!("🌉️ Dispatching {action} [{txid}] to the ONIX BAP");
        let reply = self.upstream.dispatch(action, &envelope).await?;

        // The dispatch round-trip succeeded, so a callback may now arrive at any moment; park the
        // transaction before looking at the verdict.
        let pending = self.store.open(&txid, action.callback())?;
        match classify_ack(&reply) {
            AckStatus::Accepted => trace!("🌉️ {action} [{txid}] acknowledged, awaiting {}", action.callback()),
            verdict => {
                self.store.cancel(&txid);
                warn!("🌉️ {action} [{txid}] was not acknowledged (classified {verdict:?})");
                return Err(BridgeError::UpstreamRejected { action, error: rejection_error(&reply) });
            },
        }

        let mut payload = pending.wait().await?;
        if let Some(error) = payload.error.take() {
            info!("🌉️ {} for [{txid}] carried a business error. {error}", action.callback());
            return Err(BridgeError::Business { error });
        }
        debug!("🌉️ {action} [{txid}] completed");
        Ok(ActionSuccess { transaction_id: txid, data: payload })
    }
}

/// Digs the counterparty's own error description out of a NACK reply, when it bothered to attach
/// one.
fn rejection_error(reply: &Value) -> ProtocolError {
    reply
        .get("error")
        .or_else(|| reply.pointer("/message/error"))
        .and_then(|v| serde_json::from_value::<ProtocolError>(v.clone()).ok())
        .unwrap_or_else(|| ProtocolError::from_message("The request was not acknowledged"))
}
