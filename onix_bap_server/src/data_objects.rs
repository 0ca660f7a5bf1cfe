use onix_bap_engine::{
    protocol::{CallbackEnvelope, ErrorDetail},
    ActionSuccess,
};
use serde::{Deserialize, Serialize};

/// Body of every successful action response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CallbackEnvelope>,
}

impl From<ActionSuccess> for GatewayResponse {
    fn from(success: ActionSuccess) -> Self {
        Self { success: true, transaction_id: success.transaction_id, data: Some(success.data) }
    }
}

/// Body of every failed action response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

impl ErrorBody {
    pub fn new(code: String, message: String, details: Option<Vec<ErrorDetail>>) -> Self {
        Self { success: false, error: ErrorInfo { code, message, details } }
    }
}

/// The fixed acknowledgement every callback sender receives, matched or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    message: CallbackAckMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CallbackAckMessage {
    ack: CallbackAckStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CallbackAckStatus {
    status: String,
}

impl CallbackAck {
    pub fn ack() -> Self {
        Self { message: CallbackAckMessage { ack: CallbackAckStatus { status: "ACK".to_string() } } }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub pending_transactions: usize,
    pub onix_bap_url: String,
}

impl HealthResponse {
    pub fn ok(pending_transactions: usize, onix_bap_url: String) -> Self {
        Self { status: "OK".to_string(), pending_transactions, onix_bap_url }
    }
}

/// Shared app data describing the upstream target, for health reporting.
#[derive(Debug, Clone)]
pub struct UpstreamInfo {
    pub onix_bap_url: String,
}
