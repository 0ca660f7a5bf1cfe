//! Pending-transaction correlation store.
//!
//! Every synchronous action that the upstream counterparty acknowledges is parked here behind a
//! single-assignment slot keyed by its transaction id, until the matching asynchronous callback
//! arrives or the per-entry expiry timer fires. Exactly one of {resolve, cancel, expiry} wins per
//! id; the winner is decided by a single check-and-remove under the map lock, so duplicate or late
//! arrivals are harmless no-ops.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::*;
use thiserror::Error;
use tokio::{sync::oneshot, task::JoinHandle};

use crate::protocol::{CallbackAction, CallbackEnvelope};

#[derive(Debug, Clone, Error)]
pub enum CorrelationError {
    #[error("A transaction with id {0} is already awaiting a callback")]
    Duplicate(String),
    #[error("Timeout waiting for {action} callback ({window_ms}ms)")]
    Timeout { action: CallbackAction, window_ms: u64 },
    #[error("The wait for transaction {0} was cancelled before a callback arrived")]
    Cancelled(String),
}

struct PendingCorrelation {
    action: CallbackAction,
    created_at: DateTime<Utc>,
    slot: oneshot::Sender<Result<CallbackEnvelope, CorrelationError>>,
    expiry: JoinHandle<()>,
}

/// The future half of an open correlation. Awaiting it suspends the caller until the store
/// resolves, cancels or expires the entry; the suspension parks a task, never an OS thread.
#[derive(Debug)]
pub struct PendingResult {
    transaction_id: String,
    slot: oneshot::Receiver<Result<CallbackEnvelope, CorrelationError>>,
}

impl PendingResult {
    pub async fn wait(self) -> Result<CallbackEnvelope, CorrelationError> {
        match self.slot.await {
            Ok(outcome) => outcome,
            // The sender was dropped without a verdict, i.e. the entry was cancelled.
            Err(_) => Err(CorrelationError::Cancelled(self.transaction_id)),
        }
    }
}

/// In-memory registry of in-flight transactions. Cheap to clone; clones share the same map.
/// Instances are explicitly owned and injected — there is no process-wide singleton, so tests can
/// run against isolated stores.
#[derive(Clone)]
pub struct CorrelationStore {
    pending: Arc<Mutex<HashMap<String, PendingCorrelation>>>,
    window: Duration,
}

impl CorrelationStore {
    /// `window` is how long an entry may stay pending before it expires.
    pub fn new(window: Duration) -> Self {
        Self { pending: Arc::new(Mutex::new(HashMap::new())), window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Registers a new pending transaction and starts its expiry timer. Must be called from
    /// within a tokio runtime.
    pub fn open(&self, transaction_id: &str, action: CallbackAction) -> Result<PendingResult, CorrelationError> {
        let mut pending = self.lock();
        if pending.contains_key(transaction_id) {
            return Err(CorrelationError::Duplicate(transaction_id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        let expiry = tokio::spawn({
            let store = self.clone();
            let id = transaction_id.to_string();
            async move {
                tokio::time::sleep(store.window).await;
                store.expire(&id);
            }
        });
        let entry = PendingCorrelation { action, created_at: Utc::now(), slot: tx, expiry };
        pending.insert(transaction_id.to_string(), entry);
        trace!("⏳️ Opened correlation for {action} [{transaction_id}]. {} pending.", pending.len());
        Ok(PendingResult { transaction_id: transaction_id.to_string(), slot: rx })
    }

    /// Fulfills the pending transaction with the callback payload. Returns whether a matching
    /// entry existed; duplicate and late callbacks return `false` and change nothing.
    pub fn resolve(&self, transaction_id: &str, envelope: CallbackEnvelope) -> bool {
        match self.lock().remove(transaction_id) {
            Some(entry) => {
                entry.expiry.abort();
                trace!("⏳️ Resolving correlation for {} [{transaction_id}]", entry.action);
                // The waiter may have gone away (e.g. client disconnect); that's fine.
                let _ = entry.slot.send(Ok(envelope));
                true
            },
            None => false,
        }
    }

    /// Removes and discards a pending transaction without fulfilling it. Used when the
    /// synchronous upstream reply itself signals rejection, so no callback is ever expected.
    pub fn cancel(&self, transaction_id: &str) -> bool {
        match self.lock().remove(transaction_id) {
            Some(entry) => {
                entry.expiry.abort();
                trace!("⏳️ Cancelled correlation for {} [{transaction_id}]", entry.action);
                true
            },
            None => false,
        }
    }

    /// Number of transactions currently awaiting a callback.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn expire(&self, transaction_id: &str) {
        let entry = self.lock().remove(transaction_id);
        if let Some(entry) = entry {
            let window_ms = self.window_ms();
            warn!(
                "⏳️ No {} callback for [{transaction_id}] within {window_ms}ms (pending since {}). Timing out.",
                entry.action, entry.created_at
            );
            let _ = entry.slot.send(Err(CorrelationError::Timeout { action: entry.action, window_ms }));
        }
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCorrelation>> {
        // Poisoning only happens if a holder panicked; none of the critical sections can.
        self.pending.lock().expect("pending correlation map lock poisoned")
    }
}
