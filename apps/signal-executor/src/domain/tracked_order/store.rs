//! Order store port.

use async_trait::async_trait;

use super::errors::StoreError;
use super::record::{OrderKey, OrderPatch, TrackedOrder};

/// Keyed document store owning all tracked order records.
///
/// Implemented by adapters in the infrastructure layer.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or overwrite the record at its key.
    async fn put(&self, record: TrackedOrder) -> Result<(), StoreError>;

    /// Read a record.
    async fn get(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError>;

    /// Atomically remove and return a record.
    ///
    /// Of two concurrent takes on the same key at most one observes the record.
    async fn take(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError>;

    /// Apply a patch to an existing record and return the updated record.
    /// Returns `None` without creating anything when the key is absent.
    async fn update(
        &self,
        key: &OrderKey,
        patch: OrderPatch,
    ) -> Result<Option<TrackedOrder>, StoreError>;
}
