use std::{sync::Arc, time::Duration};

use log::*;
use obg_common::Secret;
use onix_bap_engine::traits::{BuyerProfile, ProfileLookup, ProfileLookupError};
use reqwest::{Client, StatusCode};

use crate::config::ProfileServiceConfig;

const PROFILE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Buyer-profile lookup against the platform's profile service:
/// `GET <base>/buyers/<subscriber_id>`, authenticated with an API key header. A 404 means the
/// subscriber has no profile at all; an unverified profile is reported the same way, since only
/// verified buyers may trade.
#[derive(Clone)]
pub struct HttpProfileLookup {
    base_url: Option<String>,
    api_key: Secret<String>,
    client: Arc<Client>,
}

impl HttpProfileLookup {
    pub fn new(config: &ProfileServiceConfig) -> Result<Self, ProfileLookupError> {
        let client = Client::builder()
            .timeout(PROFILE_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProfileLookupError::ServiceError(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.as_ref().map(|url| url.trim_end_matches('/').to_string()),
            api_key: config.api_key.clone(),
            client: Arc::new(client),
        })
    }
}

impl ProfileLookup for HttpProfileLookup {
    async fn find_verified_buyer(&self, subscriber_id: &str) -> Result<Option<BuyerProfile>, ProfileLookupError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ProfileLookupError::ServiceError("no profile service is configured".to_string()))?;
        let url = format!("{base}/buyers/{subscriber_id}");
        trace!("👤️ GET {url}");
        let mut request = self.client.get(&url);
        if !self.api_key.reveal().is_empty() {
            request = request.header("X-Api-Key", self.api_key.reveal());
        }
        let response = request.send().await.map_err(|e| ProfileLookupError::ServiceError(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let profile: BuyerProfile =
                    response.json().await.map_err(|e| ProfileLookupError::ServiceError(e.to_string()))?;
                if !profile.verified {
                    debug!("👤️ Subscriber {subscriber_id} has a profile, but it is not verified.");
                    return Ok(None);
                }
                Ok(Some(profile))
            },
            status => Err(ProfileLookupError::ServiceError(format!("profile service returned HTTP {status}"))),
        }
    }
}
