use std::{sync::Arc, time::Duration};

use log::*;
use onix_bap_engine::{
    protocol::Order,
    traits::{Notifier, NotifyError},
};
use reqwest::Client;

const NOTIFY_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Announces order confirmations by POSTing to a configured webhook. With no webhook configured
/// the confirmation is only logged — losing a notification must never fail a finalization.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: Option<String>,
    client: Arc<Client>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(NOTIFY_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl Notifier for WebhookNotifier {
    async fn send_confirmation(&self, transaction_id: &str, order: &Order) -> Result<(), NotifyError> {
        let Some(url) = self.url.as_deref() else {
            info!("🔔️ Order [{transaction_id}] confirmed ({} units). No webhook configured.", order.total_quantity());
            return Ok(());
        };
        let body = serde_json::json!({
            "event": "order_confirmed",
            "transaction_id": transaction_id,
            "order": order,
        });
        let response =
            self.client.post(url).json(&body).send().await.map_err(|e| NotifyError::Delivery(e.to_string()))?;
        if response.status().is_success() {
            debug!("🔔️ Confirmation for [{transaction_id}] delivered");
            Ok(())
        } else {
            Err(NotifyError::Delivery(format!("confirmation webhook returned HTTP {}", response.status())))
        }
    }
}
