//! Redis-backed tracked order store.
//!
//! Records are JSON documents under
//! `tracked:{namespace}:{channel}:{order}:{role}`, with `%` and `:` inside each
//! part written as `%25` and `%3A` so that no two keys share a document.
//! `take` uses `GETDEL`;
//! `update` rewrites with `SET .. XX` so a record removed in between is not
//! recreated.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};

use crate::domain::tracked_order::{OrderKey, OrderPatch, OrderStore, StoreError, TrackedOrder};

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

fn escape_part(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

/// Redis implementation of `OrderStore`.
#[derive(Clone)]
pub struct RedisOrderStore {
    conn: ConnectionManager,
    namespace: String,
}

impl std::fmt::Debug for RedisOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisOrderStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisOrderStore {
    /// Connect to Redis. `namespace` separates venues sharing one server.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        let namespace = namespace.into();

        tracing::info!(namespace = %namespace, "Connected to Redis order store");

        Ok(Self { conn, namespace })
    }

    /// Document key for an order key.
    #[must_use]
    pub fn document_key(&self, key: &OrderKey) -> String {
        Self::document_key_in(&self.namespace, key)
    }

    fn document_key_in(namespace: &str, key: &OrderKey) -> String {
        format!(
            "tracked:{}:{}:{}:{}",
            escape_part(namespace),
            escape_part(key.channel_id.as_str()),
            escape_part(key.signal_order_id.as_str()),
            key.role
        )
    }

    fn decode(document_key: &str, raw: Option<String>) -> Result<Option<TrackedOrder>, StoreError> {
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
                key: document_key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
    }

    fn encode(document_key: &str, record: &TrackedOrder) -> Result<String, StoreError> {
        serde_json::to_string(record).map_err(|e| StoreError::Serialization {
            key: document_key.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl OrderStore for RedisOrderStore {
    async fn put(&self, record: TrackedOrder) -> Result<(), StoreError> {
        let key = self.document_key(&record.key());
        let json = Self::encode(&key, &record)?;

        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&key, json).await?;
        Ok(())
    }

    async fn get(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError> {
        let key = self.document_key(key);

        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        Self::decode(&key, raw)
    }

    async fn take(&self, key: &OrderKey) -> Result<Option<TrackedOrder>, StoreError> {
        let key = self.document_key(key);

        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get_del(&key).await?;
        Self::decode(&key, raw)
    }

    async fn update(
        &self,
        key: &OrderKey,
        patch: OrderPatch,
    ) -> Result<Option<TrackedOrder>, StoreError> {
        let document_key = self.document_key(key);

        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&document_key).await?;
        let Some(mut record) = Self::decode(&document_key, raw)? else {
            return Ok(None);
        };

        record.apply(patch);
        let json = Self::encode(&document_key, &record)?;

        let written: Option<String> = redis::cmd("SET")
            .arg(&document_key)
            .arg(json)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        Ok(written.map(|_| record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::tracked_order::OrderRole;

    fn main_key(channel: &str, order: &str) -> OrderKey {
        OrderKey::new(channel.into(), order.into(), OrderRole::Main)
    }

    #[test]
    fn plain_ids_keep_readable_keys() {
        let key = RedisOrderStore::document_key_in("paper", &main_key("alpha", "7"));

        assert_eq!(key, "tracked:paper:alpha:7:MAIN");
    }

    #[test]
    fn colons_in_ids_do_not_collide() {
        let left = RedisOrderStore::document_key_in("paper", &main_key("a:b", "c"));
        let right = RedisOrderStore::document_key_in("paper", &main_key("a", "b:c"));

        assert_ne!(left, right);
        assert_eq!(left, "tracked:paper:a%3Ab:c:MAIN");
    }

    #[test]
    fn escaped_text_in_ids_does_not_collide() {
        let literal = RedisOrderStore::document_key_in("paper", &main_key("a%3Ab", "c"));
        let colon = RedisOrderStore::document_key_in("paper", &main_key("a:b", "c"));
        let namespaced = RedisOrderStore::document_key_in("paper:a", &main_key("b", "c"));

        assert_ne!(literal, colon);
        assert_ne!(namespaced, RedisOrderStore::document_key_in("paper", &main_key("a:b", "c")));
    }

    #[test]
    fn decode_missing_is_none() {
        assert!(RedisOrderStore::decode("k", None).unwrap().is_none());
    }

    #[test]
    fn decode_garbage_is_serialization_error() {
        let err = RedisOrderStore::decode("tracked:x", Some("{not json".to_string())).unwrap_err();

        assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "tracked:x"));
    }

    #[test]
    fn redis_errors_become_backend_errors() {
        let err: StoreError = RedisError::from((redis::ErrorKind::IoError, "connection refused")).into();

        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
