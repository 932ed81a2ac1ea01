//! Cache storage and the app-shell cache manager.
//!
//! Install fetches every asset before anything is written, so a failed
//! install leaves no partial generation behind. Activation deletes every
//! cache whose name is not the current generation. Fetch answers from the
//! current generation and falls back to the network without storing.
//!
//! Entries are keyed by absolute URL, resolved against the app origin, so a
//! page requesting `http://host/index.html` finds the asset configured as
//! `/index.html`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;
use reqwest::Url;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::http::{Network, Request, Response};

/// Abstraction over named cache storage.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Returns every cache name in creation order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes a cache. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Opens (creating if absent) the named cache and writes every entry.
    ///
    /// Entries are keyed by request URL; writing an existing URL replaces it.
    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<()>;

    /// Looks up a request by exact URL in the named cache.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Returns the URLs stored in the named cache.
    async fn urls(&self, name: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
struct NamedCache {
    name: String,
    entries: Vec<(String, Response)>,
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: Mutex<Vec<NamedCache>>,
}

impl MemoryCacheStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<NamedCache>>> {
        self.caches
            .lock()
            .map_err(|_| Error::Cache("cache storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.iter().map(|c| c.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut caches = self.lock()?;
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }

    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        if let Some((request, _)) = entries.iter().find(|(r, _)| !r.is_cacheable()) {
            return Err(Error::Cache(format!(
                "cannot store {} request for {}",
                request.method, request.url
            )));
        }

        let mut caches = self.lock()?;
        let index = if let Some(i) = caches.iter().position(|c| c.name == name) {
            i
        } else {
            caches.push(NamedCache {
                name: name.to_string(),
                entries: Vec::new(),
            });
            caches.len() - 1
        };
        let cache = &mut caches[index];

        for (request, response) in entries {
            match cache.entries.iter_mut().find(|(url, _)| *url == request.url) {
                Some(slot) => slot.1 = response,
                None => cache.entries.push((request.url, response)),
            }
        }
        Ok(())
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        Ok(self
            .lock()?
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.entries.iter().find(|(url, _)| *url == request.url))
            .map(|(_, response)| response.clone()))
    }

    async fn urls(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.entries.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default())
    }
}

/// Keeps the app shell available offline and reclaims stale generations.
pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    config: CacheConfig,
    origin: Url,
}

impl CacheManager {
    /// Creates a cache manager for the configured generation. Relative asset
    /// and request URLs are resolved against `origin`.
    #[must_use]
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        config: CacheConfig,
        origin: Url,
    ) -> Self {
        Self {
            storage,
            network,
            config,
            origin,
        }
    }

    /// Returns the current generation tag.
    #[must_use]
    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    /// Fetches every configured asset and stores them under the current
    /// generation. Returns the number of assets stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetFetch`] if any asset fails or answers with a
    /// non-2xx status. Nothing is written in that case.
    pub async fn install(&self) -> Result<usize> {
        let requests: Vec<Request> = self.config.assets.iter().map(Request::get).collect();

        let responses =
            future::try_join_all(requests.iter().map(|request| self.fetch_asset(request))).await?;

        let count = requests.len();
        let entries = requests
            .iter()
            .map(|request| Request::get(self.cache_key(&request.url)))
            .zip(responses)
            .collect();
        self.storage.put_all(&self.config.generation, entries).await?;

        log::info!("Cached {count} assets in {}", self.config.generation);
        Ok(count)
    }

    /// Resolves a URL against the origin. Unparseable URLs are kept as given.
    fn cache_key(&self, url: &str) -> String {
        self.origin
            .join(url)
            .map_or_else(|_| url.to_string(), String::from)
    }

    async fn fetch_asset(&self, request: &Request) -> Result<Response> {
        let response = self
            .network
            .fetch(request)
            .await
            .map_err(|e| Error::AssetFetch {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;

        if !response.is_ok() {
            return Err(Error::AssetFetch {
                url: request.url.clone(),
                reason: format!("status {}", response.status),
            });
        }
        Ok(response)
    }

    /// Deletes every cache other than the current generation. Returns the
    /// names that were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache names cannot be listed or a deletion fails.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.config.generation)
            .collect();

        future::try_join_all(stale.iter().map(|name| async move {
            log::info!("Deleting old cache: {name}");
            self.storage.delete(name).await
        }))
        .await?;

        Ok(stale)
    }

    /// Answers a request from the current generation, or forwards it to the
    /// network on a miss without storing the result.
    ///
    /// # Errors
    ///
    /// Returns the network error on a miss that cannot be fetched.
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        if request.is_cacheable() {
            let lookup = Request::get(self.cache_key(&request.url));
            match self
                .storage
                .match_request(&self.config.generation, &lookup)
                .await
            {
                Ok(Some(cached)) => {
                    log::debug!("Cache hit: {}", lookup.url);
                    return Ok(cached);
                }
                Ok(None) => log::debug!("Cache miss: {}", lookup.url),
                Err(e) => log::warn!("Cache lookup failed for {}: {e}", lookup.url),
            }
        }
        self.network.fetch(request).await
    }
}
