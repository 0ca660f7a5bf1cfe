//! Request normalization: three caller-facing request shapes converge into one canonical
//! protocol envelope before anything is dispatched upstream.
//!
//! The shape is decided once, at the deserialization boundary, by the [`GatewayRequestBody`] sum
//! type — variants are tried in precedence order, and the first structural match wins. Each
//! variant carries only its own required fields; ad hoc duck-typing on raw JSON stops here.

use std::sync::Arc;

use chrono::Utc;
use log::*;
use obg_common::Paise;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    helpers::{new_message_id, new_transaction_id},
    protocol::{
        CanonicalEnvelope,
        Context,
        Fulfillment,
        Order,
        OrderItem,
        PartyAttributes,
        Payment,
        PaymentStatus,
        Price,
        ProtocolAction,
        ProviderRef,
        Quote,
        QuoteLine,
    },
    traits::{ProfileLookup, ProfileLookupError},
};

#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
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
}

impl From<ProfileLookupError> for NormalizeError {
    fn from(e: ProfileLookupError) -> Self {
        Self::ProfileLookup(e.to_string())
    }
}

//-------------------------------------------  Request shapes  --------------------------------------------------------

/// The three recognized request shapes, in matching precedence order: a full canonical envelope
/// short-circuits the shorthands, the catalogue shorthand short-circuits the order shorthand.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum GatewayRequestBody {
    Canonical(CanonicalEnvelope),
    CatalogSelect(CatalogSelectRequest),
    OrderShorthand(OrderShorthandRequest),
}

/// Catalogue-based shorthand, valid for `select` only: the caller forwards a provider catalogue
/// plus its own purchase attributes and lets the gateway build the order.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSelectRequest {
    pub catalogue: Catalogue,
    pub custom_attributes: CustomAttributes,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalogue {
    #[serde(default)]
    pub provider: Option<ProviderRef>,
    #[serde(default)]
    pub provider_attributes: Option<PartyAttributes>,
    #[serde(default)]
    pub items: Vec<CatalogueItem>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    #[serde(default)]
    pub item_ids: Vec<String>,
    /// Unit price offered for the referenced items.
    pub price: Price,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAttributes {
    pub quantity: i64,
    #[serde(default)]
    pub selected_offer_id: Option<String>,
}

/// Order-based shorthand: `init` carries the canonical order from the `select` step plus the
/// payment id; `confirm` carries the order from the `init` step and nothing else.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShorthandRequest {
    pub order: Order,
    #[serde(default)]
    pub payment_id: Option<String>,
}

//-------------------------------------------  Envelope settings  -----------------------------------------------------

/// The static context fields stamped onto every outbound envelope.
#[derive(Clone, Debug)]
pub struct EnvelopeSettings {
    pub domain: String,
    pub version: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub ttl: Option<String>,
}

//-------------------------------------------  Normalizer  ------------------------------------------------------------

pub struct RequestNormalizer<P> {
    profiles: Arc<P>,
    settings: EnvelopeSettings,
    /// Per-unit transmission surcharge applied when a quote is computed.
    wheeling_charge: Paise,
}

impl<P> RequestNormalizer<P> {
    pub fn new(profiles: Arc<P>, settings: EnvelopeSettings, wheeling_charge: Paise) -> Self {
        Self { profiles, settings, wheeling_charge }
    }
}

impl<P: ProfileLookup> RequestNormalizer<P> {
    /// Turns one inbound request body into a dispatch-ready canonical envelope, or fails without
    /// side effects. `caller` is the verified subscriber id of the caller, when one was attached.
    pub async fn normalize(
        &self,
        action: ProtocolAction,
        body: GatewayRequestBody,
        caller: Option<&str>,
    ) -> Result<CanonicalEnvelope, NormalizeError> {
        match body {
            GatewayRequestBody::Canonical(envelope) => self.check_canonical(action, envelope),
            GatewayRequestBody::CatalogSelect(request) => {
                if action != ProtocolAction::Select {
                    return Err(NormalizeError::Validation(format!(
                        "The catalogue shorthand is only valid for select, not {action}"
                    )));
                }
                self.expand_catalog_select(request, caller).await
            },
            GatewayRequestBody::OrderShorthand(request) => match action {
                ProtocolAction::Init => self.expand_init(request),
                ProtocolAction::Confirm => self.expand_confirm(request),
                _ => Err(NormalizeError::Validation(format!("The order shorthand is not valid for {action}"))),
            },
        }
    }

    /// Canonical envelopes bypass the shorthand expansion entirely; the gateway only validates
    /// them and refreshes the routing fields it owns.
    fn check_canonical(
        &self,
        action: ProtocolAction,
        mut envelope: CanonicalEnvelope,
    ) -> Result<CanonicalEnvelope, NormalizeError> {
        if envelope.context.transaction_id.trim().is_empty() {
            return Err(NormalizeError::MissingField("context.transaction_id".to_string()));
        }
        if action == ProtocolAction::Confirm {
            let order =
                envelope.order().ok_or_else(|| NormalizeError::MissingField("message.order".to_string()))?;
            check_settlement_parties(&order)?;
        }
        let context = &mut envelope.context;
        context.action = action.as_str().to_string();
        if context.domain.trim().is_empty() {
            context.domain = self.settings.domain.clone();
        }
        if context.version.trim().is_empty() {
            context.version = self.settings.version.clone();
        }
        if context.bap_id.trim().is_empty() {
            context.bap_id = self.settings.bap_id.clone();
        }
        if context.bap_uri.trim().is_empty() {
            context.bap_uri = self.settings.bap_uri.clone();
        }
        if context.message_id.trim().is_empty() {
            context.message_id = new_message_id();
        }
        Ok(envelope)
    }

    async fn expand_catalog_select(
        &self,
        request: CatalogSelectRequest,
        caller: Option<&str>,
    ) -> Result<CanonicalEnvelope, NormalizeError> {
        let caller = caller.ok_or(NormalizeError::Unauthorized)?;
        let profile = self.profiles.find_verified_buyer(caller).await?.ok_or(NormalizeError::NoBuyerProfile)?;
        debug!("🔀️ Expanding catalogue selection for buyer {}", profile.subscriber_id);

        let CatalogSelectRequest { catalogue, custom_attributes } = request;
        if catalogue.items.is_empty() {
            return Err(NormalizeError::Validation("catalogue.items must contain at least one item".to_string()));
        }
        if catalogue.offers.is_empty() {
            return Err(NormalizeError::Validation("catalogue.offers must contain at least one offer".to_string()));
        }
        if custom_attributes.quantity <= 0 {
            return Err(NormalizeError::Validation("customAttributes.quantity must be a positive number".to_string()));
        }
        let selected = match &custom_attributes.selected_offer_id {
            Some(id) => Some(catalogue.offers.iter().find(|o| &o.id == id).ok_or_else(|| {
                NormalizeError::Validation(format!(
                    "customAttributes.selectedOfferId {id} does not match any catalogue offer"
                ))
            })?),
            None => None,
        };

        // One order line per item/offer pair: the explicitly selected offer, or the first offer
        // referencing the item. Items no offer covers are skipped.
        let mut items = Vec::new();
        for item in &catalogue.items {
            let offer = match selected {
                Some(offer) => offer.item_ids.contains(&item.id).then_some(offer),
                None => catalogue.offers.iter().find(|o| o.item_ids.contains(&item.id)),
            };
            if let Some(offer) = offer {
                items.push(OrderItem {
                    id: item.id.clone(),
                    quantity: custom_attributes.quantity,
                    price: Some(offer.price.clone()),
                });
            }
        }
        if items.is_empty() {
            return Err(NormalizeError::Validation(
                "No catalogue item is covered by the offer selection".to_string(),
            ));
        }

        let order = Order {
            provider: catalogue.provider,
            items,
            buyer_attributes: Some(PartyAttributes {
                platform_id: profile.platform_id,
                domain_id: profile.domain_id,
            }),
            provider_attributes: catalogue.provider_attributes,
            ..Default::default()
        };
        Ok(self.fresh_envelope(ProtocolAction::Select, &order))
    }

    fn expand_init(&self, request: OrderShorthandRequest) -> Result<CanonicalEnvelope, NormalizeError> {
        let payment_id = request
            .payment_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| NormalizeError::MissingField("paymentId".to_string()))?;
        let mut order = request.order;
        if order.items.is_empty() {
            return Err(NormalizeError::Validation("order.items must contain at least one order line".to_string()));
        }

        let total_quantity = order.total_quantity();
        let energy_cost = order.items_cost();
        let wheeling = self.wheeling_charge * total_quantity;
        order.quote = Some(Quote {
            price: Price::inr(energy_cost + wheeling),
            breakup: vec![
                QuoteLine { title: "Energy cost".to_string(), price: Price::inr(energy_cost) },
                QuoteLine { title: "Wheeling charge".to_string(), price: Price::inr(wheeling) },
            ],
        });
        order.payments = vec![Payment {
            id: payment_id,
            payment_type: Some("ON-ORDER".to_string()),
            status: PaymentStatus::NotPaid,
        }];
        if order.fulfillments.is_empty() {
            order.fulfillments = vec![Fulfillment {
                id: "energy-delivery".to_string(),
                fulfillment_type: Some("DELIVERY".to_string()),
            }];
        }
        Ok(self.fresh_envelope(ProtocolAction::Init, &order))
    }

    fn expand_confirm(&self, request: OrderShorthandRequest) -> Result<CanonicalEnvelope, NormalizeError> {
        let mut order = request.order;
        if order.items.is_empty() {
            return Err(NormalizeError::Validation("order.items must contain at least one order line".to_string()));
        }
        check_settlement_parties(&order)?;
        for payment in &mut order.payments {
            payment.status = PaymentStatus::Paid;
        }
        Ok(self.fresh_envelope(ProtocolAction::Confirm, &order))
    }

    fn fresh_envelope(&self, action: ProtocolAction, order: &Order) -> CanonicalEnvelope {
        let context = Context {
            domain: self.settings.domain.clone(),
            action: action.as_str().to_string(),
            version: self.settings.version.clone(),
            bap_id: self.settings.bap_id.clone(),
            bap_uri: self.settings.bap_uri.clone(),
            bpp_id: None,
            bpp_uri: None,
            transaction_id: new_transaction_id(),
            message_id: new_message_id(),
            timestamp: Utc::now(),
            ttl: self.settings.ttl.clone(),
        };
        CanonicalEnvelope::for_order(context, order)
    }
}

/// Both settlement parties must be identified on a confirm, whatever shape it arrived in.
/// The buyer side is reported first when both are missing.
fn check_settlement_parties(order: &Order) -> Result<(), NormalizeError> {
    let buyer_present = order.buyer_attributes.as_ref().map_or(false, PartyAttributes::identifies_party);
    if !buyer_present {
        return Err(NormalizeError::MissingField("message.order.buyerAttributes.platformId".to_string()));
    }
    let provider_present = order.provider_attributes.as_ref().map_or(false, PartyAttributes::identifies_party);
    if !provider_present {
        return Err(NormalizeError::MissingField("message.order.providerAttributes.platformId".to_string()));
    }
    Ok(())
}
