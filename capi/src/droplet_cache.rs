use crate::metrics_defs::{IDENTITY_CACHE_HIT, IDENTITY_CACHE_MISS};
use crate::{Client, Result};
use async_trait::async_trait;
use moka::future::Cache;
use shared::counter;
use std::sync::Arc;

const SIZE: u64 = 10_000;

/// The two-step upstream resolution behind the identity cache.
#[async_trait]
pub trait DropletClient: Send + Sync {
    async fn app_guid(&self, app_name: &str) -> Result<String>;
    async fn droplet_guid(&self, app_guid: &str) -> Result<String>;
}

#[async_trait]
impl DropletClient for Client {
    async fn app_guid(&self, app_name: &str) -> Result<String> {
        Client::app_guid(self, app_name).await
    }

    async fn droplet_guid(&self, app_guid: &str) -> Result<String> {
        Client::droplet_guid(self, app_guid).await
    }
}

/// Memoizes app name → (app guid, droplet guid).
///
/// Concurrent fetches for the same unresolved name collapse onto a single
/// upstream attempt; every waiter shares its outcome. Failures are never
/// cached, so the next fetch after an upstream error retries cleanly.
pub struct DropletGuidCache {
    client: Arc<dyn DropletClient>,
    resolved: Cache<String, (String, String)>,
}

impl DropletGuidCache {
    pub fn new(client: Arc<dyn DropletClient>) -> Self {
        Self {
            client,
            resolved: Cache::builder().max_capacity(SIZE).build(),
        }
    }

    /// Resolves `app_name` to its (app guid, droplet guid) pair.
    ///
    /// The empty name is reserved: it resolves to empty guids without
    /// touching the upstream or the cache.
    pub async fn fetch(&self, app_name: &str) -> Result<(String, String)> {
        if app_name.is_empty() {
            return Ok((String::new(), String::new()));
        }

        if let Some(pair) = self.resolved.get(app_name).await {
            counter!(IDENTITY_CACHE_HIT).increment(1);
            return Ok(pair);
        }
        counter!(IDENTITY_CACHE_MISS).increment(1);

        let client = Arc::clone(&self.client);
        let name = app_name.to_string();
        self.resolved
            .try_get_with(app_name.to_string(), async move {
                let app_guid = client.app_guid(&name).await?;
                let droplet_guid = client.droplet_guid(&app_guid).await?;
                Ok((app_guid, droplet_guid))
            })
            .await
            .map_err(|err: Arc<crate::CapiError>| crate::CapiError::Resolution(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CapiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SpyClient {
        app_calls: AtomicUsize,
        droplet_calls: AtomicUsize,
        app_fails: AtomicUsize,
        droplet_fails: AtomicUsize,
    }

    #[async_trait]
    impl DropletClient for SpyClient {
        async fn app_guid(&self, app_name: &str) -> Result<String> {
            self.app_calls.fetch_add(1, Ordering::SeqCst);
            // Widen the window so concurrent fetches overlap the in-flight
            // resolution instead of racing past it.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.app_fails.load(Ordering::SeqCst) > 0 {
                self.app_fails.fetch_sub(1, Ordering::SeqCst);
                return Err(CapiError::AppNotFound(app_name.to_string()));
            }
            Ok(format!("{app_name}-guid"))
        }

        async fn droplet_guid(&self, app_guid: &str) -> Result<String> {
            self.droplet_calls.fetch_add(1, Ordering::SeqCst);
            if self.droplet_fails.load(Ordering::SeqCst) > 0 {
                self.droplet_fails.fetch_sub(1, Ordering::SeqCst);
                return Err(CapiError::DropletNotFound(app_guid.to_string()));
            }
            Ok(format!("{app_guid}-droplet"))
        }
    }

    fn cache_with_spy() -> (Arc<SpyClient>, DropletGuidCache) {
        let spy = Arc::new(SpyClient::default());
        let cache = DropletGuidCache::new(Arc::clone(&spy) as Arc<dyn DropletClient>);
        (spy, cache)
    }

    #[tokio::test]
    async fn resolves_app_and_droplet_guids() {
        let (_, cache) = cache_with_spy();

        let (app_guid, droplet_guid) = cache.fetch("orders").await.unwrap();
        assert_eq!(app_guid, "orders-guid");
        assert_eq!(droplet_guid, "orders-guid-droplet");
    }

    #[tokio::test]
    async fn repeated_fetches_hit_the_cache() {
        let (spy, cache) = cache_with_spy();

        cache.fetch("orders").await.unwrap();
        cache.fetch("orders").await.unwrap();
        cache.fetch("orders").await.unwrap();

        assert_eq!(spy.app_calls.load(Ordering::SeqCst), 1);
        assert_eq!(spy.droplet_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_name_short_circuits() {
        let (spy, cache) = cache_with_spy();

        let (app_guid, droplet_guid) = cache.fetch("").await.unwrap();
        assert!(app_guid.is_empty());
        assert!(droplet_guid.is_empty());
        assert_eq!(spy.app_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn app_lookup_failure_propagates() {
        let (spy, cache) = cache_with_spy();
        spy.app_fails.store(1, Ordering::SeqCst);

        assert!(cache.fetch("orders").await.is_err());
    }

    #[tokio::test]
    async fn droplet_lookup_failure_propagates() {
        let (spy, cache) = cache_with_spy();
        spy.droplet_fails.store(1, Ordering::SeqCst);

        assert!(cache.fetch("orders").await.is_err());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (spy, cache) = cache_with_spy();
        spy.app_fails.store(1, Ordering::SeqCst);

        assert!(cache.fetch("orders").await.is_err());

        let (app_guid, droplet_guid) = cache.fetch("orders").await.unwrap();
        assert_eq!(app_guid, "orders-guid");
        assert_eq!(droplet_guid, "orders-guid-droplet");
        assert_eq!(spy.app_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_fetches_for_one_name_coalesce() {
        let (spy, cache) = cache_with_spy();
        let cache = Arc::new(cache);

        let mut fetches = tokio::task::JoinSet::new();
        for _ in 0..100 {
            let cache = Arc::clone(&cache);
            fetches.spawn(async move { cache.fetch("orders").await });
        }

        while let Some(result) = fetches.join_next().await {
            let (app_guid, droplet_guid) = result.unwrap().unwrap();
            assert_eq!(app_guid, "orders-guid");
            assert_eq!(droplet_guid, "orders-guid-droplet");
        }

        assert_eq!(spy.app_calls.load(Ordering::SeqCst), 1);
        assert_eq!(spy.droplet_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_names_resolve_independently() {
        let (spy, cache) = cache_with_spy();
        let cache = Arc::new(cache);

        let mut fetches = tokio::task::JoinSet::new();
        for name in ["orders", "billing", "orders", "billing"] {
            let cache = Arc::clone(&cache);
            fetches.spawn(async move { cache.fetch(name).await.unwrap() });
        }
        while let Some(result) = fetches.join_next().await {
            result.unwrap();
        }

        assert_eq!(spy.app_calls.load(Ordering::SeqCst), 2);
    }
}
