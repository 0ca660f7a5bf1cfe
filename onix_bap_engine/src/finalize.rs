//! Best-effort bookkeeping for confirmed orders.
//!
//! Runs on the detached event-handler task, after the callback sender has already been
//! acknowledged. The three effects are independent external calls; each failure is logged and
//! swallowed, never retried, never surfaced to any caller.

use chrono::Utc;
use log::*;
use obg_common::Paise;

use crate::{
    events::OrderConfirmedEvent,
    protocol::Order,
    traits::{NewSettlement, Notifier, OrderRecord, OrderRecordStatus, OrderStore, SettlementRole, SettlementStore},
};

pub async fn finalize_confirmed_order<O, S, N>(
    event: OrderConfirmedEvent,
    orders: &O,
    settlements: &S,
    notifier: &N,
    wheeling_charge: Paise,
) where
    O: OrderStore,
    S: SettlementStore,
    N: Notifier,
{
    let OrderConfirmedEvent { transaction_id, order } = event;
    let total_quantity = order.total_quantity();
    let total_cost = order.items_cost() + wheeling_charge * total_quantity;
    debug!("🧾️ Finalizing confirmed order [{transaction_id}]: {total_quantity} units, {total_cost}");

    let record = OrderRecord {
        transaction_id: transaction_id.clone(),
        order: order.clone(),
        total_quantity,
        total_cost,
        status: OrderRecordStatus::Confirmed,
        created_at: Utc::now(),
    };
    if let Err(e) = orders.save_order(record).await {
        error!("🧾️ Could not persist the order record for [{transaction_id}]. {e}");
    }

    match new_settlement(&transaction_id, &order, total_quantity) {
        Some(settlement) => {
            if let Err(e) = settlements.create_settlement(settlement).await {
                error!("🧾️ Could not create the settlement record for [{transaction_id}]. {e}");
            }
        },
        None => {
            warn!("🧾️ Confirmed order [{transaction_id}] carries no provider attributes. Skipping settlement.")
        },
    }

    if let Err(e) = notifier.send_confirmation(&transaction_id, &order).await {
        error!("🧾️ Could not send the confirmation notification for [{transaction_id}]. {e}");
    }
}

fn new_settlement(transaction_id: &str, order: &Order, total_quantity: i64) -> Option<NewSettlement> {
    let counterparty = order.provider_attributes.as_ref().filter(|a| a.identifies_party())?;
    let item_ref = order.items.first().map(|item| item.id.clone()).unwrap_or_default();
    Some(NewSettlement {
        transaction_id: transaction_id.to_string(),
        item_ref,
        quantity: total_quantity,
        role: SettlementRole::Buyer,
        counterparty_platform_id: counterparty.platform_id.clone(),
        counterparty_domain_id: counterparty.domain_id.clone(),
    })
}
