use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::CacheConfig;

/// Cache entry classes: each has its own TTL and its own namespace,
/// so bumping one (e.g. on a weight change) never invalidates another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    Search,
    Embedding,
    Rerank,
}

/// Out-of-process result cache, Redis-backed. Must never become a hard
/// dependency: every lookup degrades to a miss and every store degrades to a
/// no-op when Redis is unreachable, mirroring the `Option<ConnectionManager>`
/// degrade-gracefully idiom used for optional external services elsewhere in
/// the pack (`legalis-api/src/cache.rs`'s `RedisCacheBackend`).
pub struct Cache {
    connection: Arc<RwLock<Option<redis::aio::ConnectionManager>>>,
    config: CacheConfig,
    search_namespace_version: AtomicU64,
}

impl Cache {
    pub async fn new(config: CacheConfig) -> Self {
        let connection = match &config.cache_url {
            Some(url) => match Self::connect(url).await {
                Ok(cm) => Some(cm),
                Err(e) => {
                    tracing::warn!(error = %e, "cache unreachable at startup, degrading to miss-always");
                    None
                }
            },
            None => None,
        };

        Self {
            connection: Arc::new(RwLock::new(connection)),
            config,
            search_namespace_version: AtomicU64::new(0),
        }
    }

    async fn connect(url: &str) -> redis::RedisResult<redis::aio::ConnectionManager> {
        let client = redis::Client::open(url)?;
        redis::aio::ConnectionManager::new(client).await
    }

    async fn connection(&self) -> Option<redis::aio::ConnectionManager> {
        self.connection.read().await.clone()
    }

    /// Any change to the tunable search weights must invalidate previously
    /// cached search results without touching embedding/rerank entries,
    /// which are keyed on query/passage content only.
    pub fn invalidate_search_namespace(&self) {
        self.search_namespace_version.fetch_add(1, Ordering::SeqCst);
    }

    fn namespaced_key(&self, class: CacheClass, key: &str) -> String {
        match class {
            CacheClass::Search => format!("search:v{}:{key}", self.search_namespace_version.load(Ordering::SeqCst)),
            CacheClass::Embedding => format!("embedding:{key}"),
            CacheClass::Rerank => format!("rerank:{key}"),
        }
    }

    fn ttl_for(&self, class: CacheClass) -> u64 {
        match class {
            CacheClass::Search => self.config.search_ttl_secs,
            CacheClass::Embedding => self.config.embedding_ttl_secs,
            CacheClass::Rerank => self.config.rerank_ttl_secs,
        }
    }

    pub async fn get(&self, class: CacheClass, key: &str) -> Option<String> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let full_key = self.namespaced_key(class, key);
        match conn.get::<_, Option<String>>(&full_key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, class: CacheClass, key: &str, value: &str) {
        use redis::AsyncCommands;

        let Some(mut conn) = self.connection().await else {
            return;
        };
        let full_key = self.namespaced_key(class, key);
        let ttl = self.ttl_for(class);
        if let Err(e) = conn.set_ex::<_, _, ()>(&full_key, value, ttl).await {
            tracing::warn!(error = %e, "cache set failed, continuing without caching");
        }
    }
}

/// Strong-ish fingerprint over normalized query and the fields that change
/// the result set: limit, namespace, rerank flag, and the active weights (so
/// a weight change is implicitly a different cache key even before the
/// namespace bump propagates).
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
        0u8.hash(&mut hasher); // separator, so "ab","c" != "a","bc"
    }
    format!("{:016x}", hasher.finish())
}

pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let a = fingerprint(&["rust", "10", "ns"]);
        let b = fingerprint(&["rust", "10", "ns"]);
        let c = fingerprint(&["rust", "10ns"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn normalize_query_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Rust   Ownership "), "rust ownership");
    }

    #[tokio::test]
    async fn cache_without_url_always_misses_and_accepts_stores() {
        let cache = Cache::new(CacheConfig {
            cache_url: None,
            search_ttl_secs: 300,
            embedding_ttl_secs: 86_400,
            rerank_ttl_secs: 600,
        })
        .await;

        cache.set(CacheClass::Search, "k", "v").await;
        assert_eq!(cache.get(CacheClass::Search, "k").await, None);
    }
}
