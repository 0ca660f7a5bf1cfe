//! # ONIX BAP Gateway Engine
//!
//! The core of the gateway's asynchronous-to-synchronous bridge. The ONIX protocol acknowledges
//! every action immediately and delivers the real result later through an out-of-band callback;
//! callers, however, expect one HTTP call to produce one final answer. This crate closes that gap:
//!
//! 1. The [`CorrelationStore`] parks each accepted request behind a future keyed by its
//!    transaction id, with a per-entry expiry timer.
//! 2. The [`GatewayApi`] normalizes one of three caller-facing request shapes into the canonical
//!    protocol envelope, forwards it upstream, classifies the synchronous ACK/NACK verdict, and
//!    suspends on the correlation until the callback lands.
//! 3. The [`CallbackApi`] accepts the delayed result, resolves the matching correlation, and —
//!    for confirmations — kicks off detached settlement/order/notification bookkeeping through
//!    the event hooks in [`events`].
//!
//! Everything durable (orders, settlements, buyer profiles, notifications) lives behind the
//! narrow collaborator traits in [`traits`]; backends implement those to plug in.

pub mod ack;
pub mod callback_api;
pub mod correlation;
pub mod events;
pub mod finalize;
pub mod gateway_api;
pub mod helpers;
pub mod memory;
pub mod normalizer;
pub mod protocol;
pub mod traits;
pub mod upstream;

pub use ack::{classify_ack, AckStatus};
pub use callback_api::{CallbackApi, CallbackDisposition};
pub use correlation::{CorrelationError, CorrelationStore, PendingResult};
pub use finalize::finalize_confirmed_order;
pub use gateway_api::{ActionSuccess, BridgeError, GatewayApi};
pub use memory::MemoryStore;
pub use normalizer::{EnvelopeSettings, GatewayRequestBody, NormalizeError, RequestNormalizer};
pub use upstream::{OnixBapClient, UpstreamApi, UpstreamApiError};
