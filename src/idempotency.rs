use crate::api::ListingReceipt;
use redis::AsyncCommands;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::warn;

const KEY_PREFIX: &str = "wizard:idempotency:";

/// Remembers the receipt of a submission so a replayed `Idempotency-Key`
/// never reaches the listing endpoint twice.
#[derive(Clone)]
pub enum IdempotencyCache {
    Memory(Arc<Mutex<HashMap<String, ListingReceipt>>>),
    Redis { client: redis::Client, ttl_secs: u64 },
}

impl IdempotencyCache {
    pub fn memory() -> Self {
        IdempotencyCache::Memory(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Redis when `url` is given and parses, memory otherwise.
    pub fn from_url(url: Option<String>, ttl_secs: u64) -> Self {
        match url.map(redis::Client::open) {
            Some(Ok(client)) => IdempotencyCache::Redis { client, ttl_secs },
            Some(Err(err)) => {
                warn!(target = "wizard.api", error = %err, "redis_url_invalid_using_memory");
                Self::memory()
            }
            None => Self::memory(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<ListingReceipt> {
        match self {
            IdempotencyCache::Memory(entries) => entries.lock().await.get(key).cloned(),
            IdempotencyCache::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await.ok()?;
                let raw: Option<String> = conn.get(format!("{KEY_PREFIX}{key}")).await.ok()?;
                raw.and_then(|value| serde_json::from_str(&value).ok())
            }
        }
    }

    pub async fn put(&self, key: &str, receipt: &ListingReceipt) {
        match self {
            IdempotencyCache::Memory(entries) => {
                entries.lock().await.insert(key.to_string(), receipt.clone());
            }
            IdempotencyCache::Redis { client, ttl_secs } => {
                if let Ok(mut conn) = client.get_multiplexed_async_connection().await
                    && let Ok(json) = serde_json::to_string(receipt)
                {
                    let _: Result<(), _> = conn
                        .set_ex(format!("{KEY_PREFIX}{key}"), json, *ttl_secs)
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_replays_receipt() {
        let cache = IdempotencyCache::from_url(None, 60);
        assert!(cache.get("k1").await.is_none());
        let receipt = ListingReceipt {
            id: "42".into(),
            slug: Some("chaises".into()),
        };
        cache.put("k1", &receipt).await;
        assert_eq!(cache.get("k1").await, Some(receipt));
        assert!(cache.get("k2").await.is_none());
    }
}
