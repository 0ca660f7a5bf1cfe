//! Interface contracts for the external collaborators the bridge drives.
//!
//! Durable order and settlement state lives in an external keyed store; buyer profiles live in a
//! profile service; confirmations go out through a notifier. The bridge only ever talks to these
//! through the traits below, so backends can be swapped without touching the core, and tests can
//! substitute mocks.

use chrono::{DateTime, Utc};
use obg_common::Paise;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Order;

//-------------------------------------------  Profile lookup  --------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ProfileLookupError {
    #[error("Profile service error: {0}")]
    ServiceError(String),
}

/// A buyer's registration on the trading platform, as the profile service reports it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerProfile {
    pub subscriber_id: String,
    pub platform_id: String,
    /// Consumer/meter account identifier in the buyer's distribution domain.
    pub domain_id: String,
    #[serde(default)]
    pub verified: bool,
}

#[allow(async_fn_in_trait)]
pub trait ProfileLookup {
    /// Resolve an authenticated caller to their *verified* buyer profile. `Ok(None)` means the
    /// caller has no verified buyer profile; transport or service failures are errors.
    async fn find_verified_buyer(&self, subscriber_id: &str) -> Result<Option<BuyerProfile>, ProfileLookupError>;
}

//-------------------------------------------  Order store  -----------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Order store error: {0}")]
    StorageError(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRecordStatus {
    Confirmed,
    Completed,
    Cancelled,
}

/// The canonical record the gateway keeps per finalized order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderRecord {
    pub transaction_id: String,
    pub order: Order,
    pub total_quantity: i64,
    pub total_cost: Paise,
    pub status: OrderRecordStatus,
    pub created_at: DateTime<Utc>,
}

#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// Persist (or overwrite) the canonical record for a finalized order.
    async fn save_order(&self, record: OrderRecord) -> Result<(), OrderStoreError>;
    async fn update_order_status(
        &self,
        transaction_id: &str,
        status: OrderRecordStatus,
    ) -> Result<(), OrderStoreError>;
    async fn fetch_order(&self, transaction_id: &str) -> Result<Option<OrderRecord>, OrderStoreError>;
}

//-------------------------------------------  Settlement store  ------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Settlement store error: {0}")]
    StorageError(String),
    #[error("A settlement for transaction {0} with role {1} already exists")]
    AlreadyExists(String, SettlementRole),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementRole {
    Buyer,
    Seller,
}

impl std::fmt::Display for SettlementRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => f.write_str("BUYER"),
            Self::Seller => f.write_str("SELLER"),
        }
    }
}

/// One settlement obligation towards a counterparty. Keyed by (transaction id, role); backends
/// must reject duplicates so that finalization stays exactly-once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSettlement {
    pub transaction_id: String,
    pub item_ref: String,
    pub quantity: i64,
    pub role: SettlementRole,
    pub counterparty_platform_id: String,
    pub counterparty_domain_id: String,
}

#[allow(async_fn_in_trait)]
pub trait SettlementStore {
    async fn create_settlement(&self, settlement: NewSettlement) -> Result<(), SettlementError>;
}

//-------------------------------------------  Notifier  --------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Could not deliver notification: {0}")]
    Delivery(String),
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send_confirmation(&self, transaction_id: &str, order: &Order) -> Result<(), NotifyError>;
}
