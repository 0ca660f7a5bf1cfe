//! The asynchronous face of the bridge: accepts delayed results from the counterparty.
//!
//! Whatever happens here, the HTTP layer replies with the fixed ACK body — the counterparty must
//! not be told its payload was rejected merely because nobody is waiting for it anymore.

use log::*;

use crate::{
    correlation::CorrelationStore,
    events::{EventProducers, OrderConfirmedEvent},
    protocol::{CallbackAction, CallbackEnvelope, Order},
};

/// Whether an inbound callback found a waiting caller. Informational only; the HTTP reply is the
/// same either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackDisposition {
    Resolved,
    Unmatched,
}

#[derive(Clone)]
pub struct CallbackApi {
    store: CorrelationStore,
    producers: EventProducers,
}

impl CallbackApi {
    pub fn new(store: CorrelationStore, producers: EventProducers) -> Self {
        Self { store, producers }
    }

    /// Matches one asynchronous result to its pending transaction and, for confirmations,
    /// triggers the detached finalization bookkeeping.
    pub async fn process_callback(&self, action: CallbackAction, envelope: CallbackEnvelope) -> CallbackDisposition {
        let Some(txid) = envelope.transaction_id().map(str::to_string) else {
            warn!("📨️ {action} callback carries no transaction id. Acknowledging and discarding.");
            return CallbackDisposition::Unmatched;
        };
        let disposition = if self.store.resolve(&txid, envelope.clone()) {
            debug!("📨️ {action} [{txid}] matched a pending transaction");
            CallbackDisposition::Resolved
        } else {
            // Duplicate, unsolicited, or the caller already timed out. Nothing to unblock.
            debug!("📨️ No pending transaction matches {action} [{txid}]");
            CallbackDisposition::Unmatched
        };

        if action == CallbackAction::OnConfirm && envelope.error.is_none() {
            match envelope.order() {
                Some(order) => self.publish_order_confirmed(txid, order).await,
                None => warn!("📨️ on_confirm [{txid}] carries no order payload. Skipping finalization."),
            }
        }
        disposition
    }

    async fn publish_order_confirmed(&self, transaction_id: String, order: Order) {
        for producer in &self.producers.order_confirmed_producer {
            trace!("📨️ Publishing order-confirmed event for [{transaction_id}]");
            let event = OrderConfirmedEvent { transaction_id: transaction_id.clone(), order: order.clone() };
            producer.publish_event(event).await;
        }
    }
}
