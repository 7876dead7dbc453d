//! City name → coordinate resolution with a process-wide cache.
//!
//! The cache is bounded (LRU) and entries expire after a TTL; expiry is lazy,
//! checked on lookup. Concurrent resolutions of the same name share one
//! provider call: the first caller creates a cell in `inflight`, everyone else
//! awaits that cell. Failures are never cached.

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, time::Duration};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::{sync::OnceCell, time::Instant};
use tracing::{debug, instrument, warn};

use crate::{
    config::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS},
    error::AgentError,
    model::Coordinate,
    provider::GeocodingProvider,
};

type Lookup = Arc<OnceCell<Result<Coordinate, AgentError>>>;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    coordinate: Coordinate,
    inserted_at: Instant,
}

pub struct Geocoder {
    provider: Arc<dyn GeocodingProvider>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Lookup>>,
    ttl: Duration,
    timeout: Duration,
}

impl Geocoder {
    pub fn new(provider: Arc<dyn GeocodingProvider>) -> Self {
        Self::with_limits(
            provider,
            NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
        .with_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_limits(
        provider: Arc<dyn GeocodingProvider>,
        capacity: NonZeroUsize,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
            ttl,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve a city name, hitting the provider at most once per name while
    /// a fresh entry is cached or a lookup is already in flight.
    #[instrument(name = "geocode", level = "debug", skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<Coordinate, AgentError> {
        let key = cache_key(name);
        if key.is_empty() {
            return Err(AgentError::city_not_found(name));
        }

        if let Some(coordinate) = self.cached(&key) {
            debug!("geocode cache hit");
            return Ok(coordinate);
        }

        let cell = self.inflight.lock().entry(key.clone()).or_default().clone();

        let result = cell.get_or_init(|| self.fetch(&key, name)).await.clone();

        let mut inflight = self.inflight.lock();
        if inflight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            inflight.remove(&key);
        }

        result
    }

    /// Number of live entries, including ones that expired but were not yet looked up.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    fn cached(&self, key: &str) -> Option<Coordinate> {
        let mut cache = self.cache.lock();
        let entry = *cache.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            return Some(entry.coordinate);
        }
        debug!("geocode cache entry expired");
        cache.pop(key);
        None
    }

    async fn fetch(&self, key: &str, name: &str) -> Result<Coordinate, AgentError> {
        // A previous leader may have filled the cache after our miss.
        if let Some(coordinate) = self.cached(key) {
            return Ok(coordinate);
        }

        debug!("geocode cache miss, querying provider");
        let found = tokio::time::timeout(self.timeout, self.provider.lookup(name))
            .await
            .map_err(|_| {
                AgentError::network(format!("geocoding timed out after {:?}", self.timeout))
            })
            .and_then(|r| r)
            .map_err(|e| e.for_city(name))?;

        let Some(coordinate) = found else {
            warn!("no geocoding match");
            return Err(AgentError::city_not_found(name));
        };

        self.cache.lock().put(
            key.to_string(),
            CacheEntry {
                coordinate,
                inserted_at: Instant::now(),
            },
        );
        Ok(coordinate)
    }
}

fn cache_key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
