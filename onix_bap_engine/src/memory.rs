//! In-memory implementation of the order and settlement stores.
//!
//! Durable persistence is an external collaborator's job; deployments point the gateway at their
//! own keyed store by implementing [`OrderStore`] and [`SettlementStore`]. This map-backed
//! implementation is the stand-in for single-node deployments and the fixture the tests run
//! against.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::traits::{
    NewSettlement,
    OrderRecord,
    OrderRecordStatus,
    OrderStore,
    OrderStoreError,
    SettlementError,
    SettlementRole,
    SettlementStore,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    orders: Arc<Mutex<HashMap<String, OrderRecord>>>,
    settlements: Arc<Mutex<HashMap<(String, SettlementRole), NewSettlement>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all settlement records, for inspection and tests.
    pub fn settlements(&self) -> Vec<NewSettlement> {
        self.lock_settlements().values().cloned().collect()
    }

    pub fn order_count(&self) -> usize {
        self.lock_orders().len()
    }

    fn lock_orders(&self) -> MutexGuard<'_, HashMap<String, OrderRecord>> {
        self.orders.lock().expect("order map lock poisoned")
    }

    fn lock_settlements(&self) -> MutexGuard<'_, HashMap<(String, SettlementRole), NewSettlement>> {
        self.settlements.lock().expect("settlement map lock poisoned")
    }
}

impl OrderStore for MemoryStore {
    async fn save_order(&self, record: OrderRecord) -> Result<(), OrderStoreError> {
        self.lock_orders().insert(record.transaction_id.clone(), record);
        Ok(())
    }

    async fn update_order_status(
        &self,
        transaction_id: &str,
        status: OrderRecordStatus,
    ) -> Result<(), OrderStoreError> {
        match self.lock_orders().get_mut(transaction_id) {
            Some(record) => {
                record.status = status;
                Ok(())
            },
            None => Err(OrderStoreError::StorageError(format!("no order record for transaction {transaction_id}"))),
        }
    }

    async fn fetch_order(&self, transaction_id: &str) -> Result<Option<OrderRecord>, OrderStoreError> {
        Ok(self.lock_orders().get(transaction_id).cloned())
    }
}

impl SettlementStore for MemoryStore {
    async fn create_settlement(&self, settlement: NewSettlement) -> Result<(), SettlementError> {
        let mut settlements = self.lock_settlements();
        let key = (settlement.transaction_id.clone(), settlement.role);
        if settlements.contains_key(&key) {
            return Err(SettlementError::AlreadyExists(key.0, key.1));
        }
        settlements.insert(key, settlement);
        Ok(())
    }
}
