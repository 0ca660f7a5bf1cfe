//! Detached event hooks for post-callback bookkeeping.
//!
//! Finalization side effects (order record, settlement, notification) run off the critical path
//! of the callback acknowledgement: the callback receiver publishes an event and replies
//! immediately, while a subscribed handler task performs the slow bookkeeping on its own. Handler
//! failures are logged and never reach any HTTP response — the contract is best-effort, no retry.

mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::OrderConfirmedEvent;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
