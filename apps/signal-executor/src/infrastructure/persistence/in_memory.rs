//! In-memory tracked order store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::tracked_order::{OrderKey, OrderPatch, OrderStore, StoreError, TrackedOrder};

/// In-memory implementation of `OrderStore`.
///
/// Every operation runs under one lock, so `take` is atomic. State is lost
/// on restart.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    records: RwLock<HashMap<OrderKey, TrackedOrder>>,
}

impl InMemoryOrderStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |records| records.len())
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records.
    pub fn snapshot(&self) -> Vec<TrackedOrder> {
        self.records
            .read()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn put(&self, record: TrackedOrder) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.key(), record);
        Ok(())
    }

    async fn get(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    async fn take(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        Ok(records.remove(key))
    }

    async fn update(
        &self,
        key: &OrderKey,
        patch: OrderPatch,
    ) -> Result<Option<TrackedOrder>, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get_mut(key).map(|record| {
            record.apply(patch);
            record.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{ContractType, SignalAction, SignalType, TradeSignal};
    use crate::domain::tracked_order::{OrderRole, TrackedStatus};
    use std::sync::Arc;

    fn record(order_id: &str, role: OrderRole) -> TrackedOrder {
        let signal = TradeSignal {
            order_id: order_id.into(),
            channel_id: "chan".into(),
            ticker: "EUR.USD".to_string(),
            action: SignalAction::Buy,
            contract_type: ContractType::Market,
            price: None,
            stop_loss: None,
            take_profit: None,
            kind: SignalType::Open,
        };
        TrackedOrder::new(&signal, role, "b-1".into(), None)
    }

    #[tokio::test]
    async fn get_after_put_returns_record_unchanged() {
        let store = InMemoryOrderStore::new();
        let original = record("1", OrderRole::Main);

        store.put(original.clone()).await.unwrap();

        assert_eq!(store.get(&original.key()).await.unwrap(), Some(original.clone()));
        assert_eq!(store.get(&original.key()).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn take_removes_record() {
        let store = InMemoryOrderStore::new();
        let original = record("1", OrderRole::Stoploss);
        store.put(original.clone()).await.unwrap();

        let taken = store.take(&original.key()).await.unwrap();

        assert_eq!(taken, Some(original.clone()));
        assert!(store.get(&original.key()).await.unwrap().is_none());
        assert!(store.take(&original.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roles_are_separate_keys() {
        let store = InMemoryOrderStore::new();
        store.put(record("1", OrderRole::Main)).await.unwrap();
        store.put(record("1", OrderRole::Takeprofit)).await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn put_overwrites_same_key() {
        let store = InMemoryOrderStore::new();
        store.put(record("1", OrderRole::Main)).await.unwrap();
        store.put(record("1", OrderRole::Main)).await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_missing_key_creates_nothing() {
        let store = InMemoryOrderStore::new();
        let key = record("9", OrderRole::Main).key();

        let updated = store.update(&key, OrderPatch::retire()).await.unwrap();

        assert!(updated.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let store = InMemoryOrderStore::new();
        let original = record("1", OrderRole::Main);
        store.put(original.clone()).await.unwrap();

        let updated = store
            .update(
                &original.key(),
                OrderPatch {
                    broker_position_id: Some("p-1".into()),
                    ..OrderPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, TrackedStatus::Filled);
        assert_eq!(store.get(&original.key()).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn concurrent_takes_see_record_once() {
        let store = Arc::new(InMemoryOrderStore::new());
        let original = record("1", OrderRole::Takeprofit);
        store.put(original.clone()).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = original.key();
                tokio::spawn(async move { store.take(&key).await.unwrap() })
            })
            .collect();

        let mut found = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                found += 1;
            }
        }

        assert_eq!(found, 1);
    }
}
