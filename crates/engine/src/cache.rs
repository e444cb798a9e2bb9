use chrono::NaiveDate;
use core_types::CurrencyCode;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Which report a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    Latest,
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub currency: CurrencyCode,
    pub slot: CacheSlot,
}

impl CacheKey {
    pub fn latest(currency: &CurrencyCode) -> Self {
        Self {
            currency: currency.clone(),
            slot: CacheSlot::Latest,
        }
    }

    pub fn on(currency: &CurrencyCode, date: NaiveDate) -> Self {
        Self {
            currency: currency.clone(),
            slot: CacheSlot::Date(date),
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A map whose entries expire a fixed time after they were written.
///
/// Readers share the lock and never block each other. Expiry is the only way
/// an entry becomes invisible; there is no invalidation call.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if present and younger than the TTL.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value`, replacing any previous entry and restarting its TTL.
    pub async fn insert(&self, key: K, value: V) {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn eur() -> CurrencyCode {
        "EUR".parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_the_ttl() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.insert(CacheKey::latest(&eur()), 42).await;

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&CacheKey::latest(&eur())).await, Some(42));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&CacheKey::latest(&eur())).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_an_entry_restarts_its_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::latest(&eur());
        cache.insert(key.clone(), 1).await;
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.insert(key.clone(), 2).await;
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(cache.get(&key).await, Some(2));
    }

    #[tokio::test]
    async fn slots_are_distinct_keys() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        cache.insert(CacheKey::latest(&eur()), "latest").await;
        cache.insert(CacheKey::on(&eur(), date), "dated").await;

        assert_eq!(cache.get(&CacheKey::on(&eur(), date)).await, Some("dated"));
        assert_eq!(cache.get(&CacheKey::latest(&eur())).await, Some("latest"));
        assert_eq!(cache.get(&CacheKey::latest(&"GBP".parse().unwrap())).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(CacheKey::latest(&eur()), 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert(CacheKey::latest(&"JPY".parse().unwrap()), 2).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = CacheKey::on(&eur(), NaiveDate::from_ymd_opt(2024, 1, 1 + i % 4).unwrap());
                cache.insert(key.clone(), i).await;
                cache.get(&key).await.is_some()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(cache.len().await, 4);
    }
}
