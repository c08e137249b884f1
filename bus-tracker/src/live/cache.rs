//! Short-lived cache for live responses.
//!
//! Several observed stops often share a route-direction. Within one poll
//! cycle they should share one fetch per variant rather than each hitting
//! the portal. The TTL is kept below the poll interval so every cycle still
//! sees fresh positions.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::{RouteKey, TrafficSegment};
use crate::upstream::{LiveSource, UpstreamError};

use super::selector::CandidateStrategy;
use super::snapshot::LiveSnapshot;

/// Cache key for live snapshots: (route-direction, variant name).
type SnapshotKey = (RouteKey, String);

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(4),
            max_capacity: 1000,
        }
    }
}

/// Live source with caching.
///
/// Wraps any [`LiveSource`]. Only successful responses are cached, including
/// "no data" ones; errors always go back to the source next time.
pub struct CachedLiveSource<S> {
    source: S,
    snapshots: MokaCache<SnapshotKey, Option<Arc<LiveSnapshot>>>,
    traffic: MokaCache<RouteKey, Arc<Vec<TrafficSegment>>>,
}

impl<S: LiveSource> CachedLiveSource<S> {
    /// Create a new cached source.
    pub fn new(source: S, config: &CacheConfig) -> Self {
        let snapshots = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        let traffic = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            source,
            snapshots,
            traffic,
        }
    }

    /// Access the underlying source for operations that bypass cache.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: LiveSource> LiveSource for CachedLiveSource<S> {
    async fn fetch_live(
        &self,
        key: &RouteKey,
        strategy: &dyn CandidateStrategy,
    ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
        let cache_key = (key.clone(), strategy.name().to_string());

        if let Some(cached) = self.snapshots.get(&cache_key).await {
            return Ok(cached);
        }

        let fetched = self.source.fetch_live(key, strategy).await?;
        self.snapshots.insert(cache_key, fetched.clone()).await;
        Ok(fetched)
    }

    async fn fetch_traffic(&self, key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
        if let Some(cached) = self.traffic.get(key).await {
            return Ok(cached.as_ref().clone());
        }

        let fetched = self.source.fetch_traffic(key).await?;
        self.traffic
            .insert(key.clone(), Arc::new(fetched.clone()))
            .await;
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::{RouteTypeStrategy, SnapshotStop};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        live: AtomicUsize,
        traffic: AtomicUsize,
        fail: bool,
    }

    impl LiveSource for Counting {
        async fn fetch_live(
            &self,
            key: &RouteKey,
            strategy: &dyn CandidateStrategy,
        ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
            self.live.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpstreamError::RateLimited);
            }
            Ok(Some(Arc::new(LiveSnapshot::new(
                key.clone(),
                strategy.name(),
                vec![SnapshotStop::new("M1", "A")],
                vec![],
            ))))
        }

        async fn fetch_traffic(&self, _key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
            self.traffic.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn key() -> RouteKey {
        "33_0".parse().unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(4));
        assert_eq!(config.max_capacity, 1000);
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let cached = CachedLiveSource::new(Counting::default(), &CacheConfig::default());
        let strategy = RouteTypeStrategy::new("2");

        let a = cached.fetch_live(&key(), &strategy).await.unwrap().unwrap();
        let b = cached.fetch_live(&key(), &strategy).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cached.source().live.load(Ordering::SeqCst), 1);

        cached.fetch_traffic(&key()).await.unwrap();
        cached.fetch_traffic(&key()).await.unwrap();
        assert_eq!(cached.source().traffic.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn variants_are_cached_separately() {
        let cached = CachedLiveSource::new(Counting::default(), &CacheConfig::default());
        cached
            .fetch_live(&key(), &RouteTypeStrategy::new("2"))
            .await
            .unwrap();
        cached
            .fetch_live(&key(), &RouteTypeStrategy::new("0"))
            .await
            .unwrap();
        assert_eq!(cached.source().live.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let source = Counting {
            fail: true,
            ..Default::default()
        };
        let cached = CachedLiveSource::new(source, &CacheConfig::default());
        let strategy = RouteTypeStrategy::new("2");

        assert!(cached.fetch_live(&key(), &strategy).await.is_err());
        assert!(cached.fetch_live(&key(), &strategy).await.is_err());
        assert_eq!(cached.source().live.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let config = CacheConfig {
            ttl: Duration::from_millis(50),
            max_capacity: 10,
        };
        let cached = CachedLiveSource::new(Counting::default(), &config);
        let strategy = RouteTypeStrategy::new("2");

        cached.fetch_live(&key(), &strategy).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cached.fetch_live(&key(), &strategy).await.unwrap();
        assert_eq!(cached.source().live.load(Ordering::SeqCst), 2);
    }
}
