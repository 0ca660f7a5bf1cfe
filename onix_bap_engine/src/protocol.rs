//! Wire types for the ONIX protocol envelope.
//!
//! The outbound side is strongly typed: every envelope this gateway dispatches is assembled from
//! the structs in this module. The inbound callback side is deliberately tolerant — counterparty
//! implementations drift, and a callback that cannot be fully parsed must still be matched to its
//! pending transaction and acknowledged. [`CallbackEnvelope`] therefore keeps `context` and
//! `message` as raw JSON and offers typed accessors for the few fields the bridge actually reads.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use obg_common::{Paise, INR_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

//-------------------------------------------  Actions  ---------------------------------------------------------------

/// The synchronous protocol actions this gateway exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolAction {
    Select,
    Init,
    Confirm,
    Status,
}

impl ProtocolAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Init => "init",
            Self::Confirm => "confirm",
            Self::Status => "status",
        }
    }

    /// The asynchronous result type that completes this action.
    pub fn callback(&self) -> CallbackAction {
        match self {
            Self::Select => CallbackAction::OnSelect,
            Self::Init => CallbackAction::OnInit,
            Self::Confirm => CallbackAction::OnConfirm,
            Self::Status => CallbackAction::OnStatus,
        }
    }
}

impl Display for ProtocolAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The asynchronous result types the counterparty posts back. The first four complete the
/// synchronous actions; the rest are lifecycle events that only ever arrive out-of-band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackAction {
    OnSelect,
    OnInit,
    OnConfirm,
    OnStatus,
    OnUpdate,
    OnRating,
    OnSupport,
    OnTrack,
    OnCancel,
}

impl CallbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnSelect => "on_select",
            Self::OnInit => "on_init",
            Self::OnConfirm => "on_confirm",
            Self::OnStatus => "on_status",
            Self::OnUpdate => "on_update",
            Self::OnRating => "on_rating",
            Self::OnSupport => "on_support",
            Self::OnTrack => "on_track",
            Self::OnCancel => "on_cancel",
        }
    }
}

impl Display for CallbackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//-------------------------------------------  Context  ---------------------------------------------------------------

/// The routing block carried by every envelope. Most fields are defaulted so that a caller's
/// canonical envelope survives parsing even when it only supplies the handful of fields it cares
/// about; the normalizer fills in the rest before dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub bap_id: String,
    #[serde(default)]
    pub bap_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpp_uri: Option<String>,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

//-------------------------------------------  Order  -----------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<Payment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fulfillments: Vec<Fulfillment>,
    /// Identifies the buying settlement party. Mandatory on every `confirm`.
    #[serde(default, rename = "buyerAttributes", skip_serializing_if = "Option::is_none")]
    pub buyer_attributes: Option<PartyAttributes>,
    /// Identifies the selling settlement party. Mandatory on every `confirm`.
    #[serde(default, rename = "providerAttributes", skip_serializing_if = "Option::is_none")]
    pub provider_attributes: Option<PartyAttributes>,
}

impl Order {
    /// Sum of the per-line quantities.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of quantity × unit price over all order lines. Lines without a price contribute
    /// nothing.
    pub fn items_cost(&self) -> Paise {
        self.items.iter().filter_map(|item| item.price.as_ref().map(|p| p.value * item.quantity)).sum()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderRef {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    #[serde(default)]
    pub quantity: i64,
    /// Unit price for this line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub value: Paise,
}

fn default_currency() -> String {
    INR_CURRENCY_CODE.to_string()
}

impl Price {
    pub fn inr(value: Paise) -> Self {
        Self { currency: default_currency(), value }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakup: Vec<QuoteLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuoteLine {
    pub title: String,
    pub price: Price,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "NOT-PAID")]
    NotPaid,
    #[serde(rename = "PAID")]
    Paid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub fulfillment_type: Option<String>,
}

/// The pair of identifiers that names one settlement party on its platform.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyAttributes {
    #[serde(default)]
    pub platform_id: String,
    #[serde(default)]
    pub domain_id: String,
}

impl PartyAttributes {
    /// An all-whitespace platform id counts as missing.
    pub fn identifies_party(&self) -> bool {
        !self.platform_id.trim().is_empty()
    }
}

//-------------------------------------------  Envelopes  -------------------------------------------------------------

/// The one protocol-native request shape every normalized input converges to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalEnvelope {
    pub context: Context,
    pub message: Value,
}

impl CanonicalEnvelope {
    pub fn for_order(context: Context, order: &Order) -> Self {
        Self { context, message: serde_json::json!({ "order": order }) }
    }

    pub fn order(&self) -> Option<Order> {
        self.message.get("order").and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// An asynchronous result posted by the counterparty. Parsed leniently; see the module docs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

impl CallbackEnvelope {
    pub fn transaction_id(&self) -> Option<&str> {
        self.context.get("transaction_id").and_then(Value::as_str).map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn order(&self) -> Option<Order> {
        self.message.get("order").and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

//-------------------------------------------  Errors  ----------------------------------------------------------------

/// A business-level error as reported by the counterparty, either inside a callback or inside a
/// synchronous NACK reply.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProtocolError {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Comma-separated document paths the counterparty blames for a validation failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<String>,
}

impl ProtocolError {
    pub fn from_message<S: Display>(message: S) -> Self {
        Self { message: Some(message.to_string()), ..Default::default() }
    }

    /// Expands `paths` into per-field detail entries for the caller-facing error body.
    pub fn details(&self) -> Vec<ErrorDetail> {
        let message = self.message.clone().unwrap_or_default();
        self.paths
            .as_deref()
            .map(|paths| {
                paths
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| ErrorDetail { field: p.to_string(), message: message.clone() })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "[{code}] {message}"),
            (Some(code), None) => write!(f, "[{code}]"),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("no error detail provided"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}
