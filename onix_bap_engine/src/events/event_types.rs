use crate::protocol::Order;

/// Emitted when an `on_confirm` callback with an attached order and no business error has been
/// processed. Subscribers perform the settlement/order/notification bookkeeping.
#[derive(Clone, Debug)]
pub struct OrderConfirmedEvent {
    pub transaction_id: String,
    pub order: Order,
}
