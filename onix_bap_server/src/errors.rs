use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use onix_bap_engine::BridgeError;
use thiserror::Error;

use crate::data_objects::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("No verified caller identity was attached to the request")]
    MissingCallerIdentity,
    #[error("Callbacks from this peer address are not accepted")]
    ForbiddenCallbackPeer,
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ServerError {
    /// The stable machine-readable code carried by every error response.
    fn error_code(&self) -> String {
        match self {
            Self::MissingCallerIdentity => "UNAUTHORIZED".to_string(),
            Self::ForbiddenCallbackPeer => "FORBIDDEN_PEER".to_string(),
            Self::Bridge(e) => match e {
                BridgeError::Validation(_) => "VALIDATION_ERROR".to_string(),
                BridgeError::MissingField(_) => "MISSING_REQUIRED_FIELD".to_string(),
                BridgeError::Unauthorized => "UNAUTHORIZED".to_string(),
                BridgeError::NoBuyerProfile => "NO_BUYER_PROFILE".to_string(),
                BridgeError::ProfileLookup(_) => "PROFILE_LOOKUP_FAILED".to_string(),
                BridgeError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION".to_string(),
                BridgeError::Timeout { .. } => "CALLBACK_TIMEOUT".to_string(),
                BridgeError::UpstreamRejected { error, .. } => {
                    error.code.clone().unwrap_or_else(|| "UPSTREAM_REJECTED".to_string())
                },
                BridgeError::Upstream { .. } => "UPSTREAM_ERROR".to_string(),
                BridgeError::Business { error } => error.code.clone().unwrap_or_else(|| "BUSINESS_ERROR".to_string()),
                BridgeError::Internal(_) => "INTERNAL_ERROR".to_string(),
            },
            _ => "INTERNAL_ERROR".to_string(),
        }
    }

    fn error_details(&self) -> Option<Vec<onix_bap_engine::protocol::ErrorDetail>> {
        let Self::Bridge(BridgeError::Upstream { error, .. }) = self else {
            return None;
        };
        let details = error.details();
        (!details.is_empty()).then_some(details)
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCallerIdentity => StatusCode::UNAUTHORIZED,
            Self::ForbiddenCallbackPeer => StatusCode::FORBIDDEN,
            Self::Bridge(e) => match e {
                BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
                BridgeError::MissingField(_) => StatusCode::BAD_REQUEST,
                BridgeError::Unauthorized => StatusCode::UNAUTHORIZED,
                BridgeError::NoBuyerProfile => StatusCode::FORBIDDEN,
                BridgeError::ProfileLookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BridgeError::DuplicateTransaction(_) => StatusCode::CONFLICT,
                BridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                BridgeError::UpstreamRejected { .. } => StatusCode::BAD_REQUEST,
                BridgeError::Upstream { .. } => StatusCode::BAD_GATEWAY,
                BridgeError::Business { .. } => StatusCode::BAD_REQUEST,
                BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = ErrorBody::new(self.error_code(), self.to_string(), self.error_details());
        HttpResponse::build(self.status_code()).json(body)
    }
}
