//! Symbol directory cache.
//!
//! Keeps the full symbol universe of an exchange with the time it was
//! fetched. A fresh entry (age < TTL) is served without touching the network;
//! otherwise the directory is refetched and the stored entry overwritten.
//!
//! When a refetch fails and a stale entry exists, the stale entry is served
//! with a warning if `serve_stale_on_error` is set.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

use besst_common::{Error, Result};

use super::provider::MarketDataProvider;
use super::SymbolRecord;
use crate::clock::Clock;
use crate::error::ScreenerError;

/// Stored symbol universe of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSymbolSet {
    pub symbols: Vec<SymbolRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedSymbolSet {
    /// Age relative to `now`. Negative when the entry was written by a clock
    /// running ahead of ours.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Document store for cached symbol sets, keyed by exchange.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    async fn get(&self, exchange_key: &str) -> Result<Option<CachedSymbolSet>>;

    /// Store `set`, replacing any previous entry for the key.
    async fn put(&self, exchange_key: &str, set: &CachedSymbolSet) -> Result<()>;
}

/// Process-local store. Used when the SQLite file cannot be opened, and in tests.
#[derive(Debug, Default)]
pub struct InMemorySymbolStore {
    entries: RwLock<HashMap<String, CachedSymbolSet>>,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SymbolStore for InMemorySymbolStore {
    async fn get(&self, exchange_key: &str) -> Result<Option<CachedSymbolSet>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Storage("symbol store lock poisoned".into()))?;
        Ok(entries.get(exchange_key).cloned())
    }

    async fn put(&self, exchange_key: &str, set: &CachedSymbolSet) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("symbol store lock poisoned".into()))?;
        entries.insert(exchange_key.to_string(), set.clone());
        Ok(())
    }
}

/// TTL cache in front of the provider's symbol directory.
pub struct SymbolCache {
    store: Arc<dyn SymbolStore>,
    provider: Arc<dyn MarketDataProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    serve_stale_on_error: bool,
}

impl SymbolCache {
    pub fn new(
        store: Arc<dyn SymbolStore>,
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            ttl,
            serve_stale_on_error: true,
        }
    }

    /// Serve stale entries when a refresh fails (default: true).
    pub fn with_serve_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    /// Return the symbol universe for `exchange_key`, refreshing if stale.
    pub async fn get_universe(
        &self,
        exchange_key: &str,
    ) -> std::result::Result<Vec<SymbolRecord>, ScreenerError> {
        let now = self.clock.now();

        // An unreadable entry counts as a miss
        let cached = match self.store.get(exchange_key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(exchange = exchange_key, error = %e, "Symbol cache read failed, refetching");
                None
            }
        };

        if let Some(entry) = &cached {
            if entry.is_fresh(now, self.ttl) {
                debug!(
                    exchange = exchange_key,
                    count = entry.symbols.len(),
                    age_secs = entry.age(now).num_seconds(),
                    "Symbol cache hit"
                );
                return Ok(entry.symbols.clone());
            }
        }

        info!(
            exchange = exchange_key,
            provider = self.provider.name(),
            "Refreshing symbol directory"
        );

        match self.provider.list_symbols(exchange_key).await {
            Ok(symbols) => {
                let set = CachedSymbolSet {
                    symbols,
                    fetched_at: now,
                };
                if let Err(e) = self.store.put(exchange_key, &set).await {
                    warn!(exchange = exchange_key, error = %e, "Failed to persist symbol directory");
                }
                info!(exchange = exchange_key, count = set.symbols.len(), "Symbol directory refreshed");
                Ok(set.symbols)
            }
            Err(e) => match cached {
                Some(stale) if self.serve_stale_on_error => {
                    warn!(
                        exchange = exchange_key,
                        error = %e,
                        recoverable = e.is_recoverable(),
                        age_secs = stale.age(now).num_seconds(),
                        "Symbol directory refresh failed, serving stale cache"
                    );
                    Ok(stale.symbols)
                }
                _ => {
                    error!(
                        exchange = exchange_key,
                        error = %e,
                        recoverable = e.is_recoverable(),
                        "Symbol directory unavailable and no usable cache"
                    );
                    Err(ScreenerError::UpstreamUnavailable {
                        exchange: exchange_key.to_string(),
                        cause: e.to_string(),
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::{ProviderError, Quote, ValuationMetrics};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct DirectoryProvider {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl DirectoryProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl MarketDataProvider for DirectoryProvider {
        fn name(&self) -> &'static str {
            "directory"
        }

        async fn list_symbols(
            &self,
            _exchange: &str,
        ) -> std::result::Result<Vec<SymbolRecord>, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("Connection failed".into()));
            }
            Ok(vec![SymbolRecord::new(format!("SYM{}", n))])
        }

        async fn get_market_cap(
            &self,
            _symbol: &str,
        ) -> std::result::Result<Option<f64>, ProviderError> {
            Ok(None)
        }

        async fn get_quote(&self, _symbol: &str) -> std::result::Result<Quote, ProviderError> {
            Ok(Quote::default())
        }

        async fn get_valuation(
            &self,
            _symbol: &str,
        ) -> std::result::Result<ValuationMetrics, ProviderError> {
            Ok(ValuationMetrics::default())
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_freshness_boundary() {
        let set = CachedSymbolSet {
            symbols: vec![],
            fetched_at: start(),
        };
        let ttl = Duration::hours(24);
        assert!(set.is_fresh(start() + Duration::hours(23), ttl));
        assert!(!set.is_fresh(start() + Duration::hours(24), ttl));
        assert!(set.is_fresh(start() - Duration::minutes(5), ttl));
    }

    #[tokio::test]
    async fn test_stale_entry_served_when_refresh_fails() {
        let provider = DirectoryProvider::new();
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(InMemorySymbolStore::new());
        let cache = SymbolCache::new(store, provider.clone(), clock.clone(), Duration::hours(24));

        let first = cache.get_universe("US").await.unwrap();
        provider.failing.store(true, Ordering::SeqCst);
        clock.advance(Duration::hours(48));

        let second = cache.get_universe("US").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_entry_rejected_when_disabled() {
        let provider = DirectoryProvider::new();
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(InMemorySymbolStore::new());
        let cache = SymbolCache::new(store, provider.clone(), clock.clone(), Duration::hours(24))
            .with_serve_stale_on_error(false);

        cache.get_universe("US").await.unwrap();
        provider.failing.store(true, Ordering::SeqCst);
        clock.advance(Duration::hours(48));

        let err = cache.get_universe("US").await.unwrap_err();
        assert!(matches!(err, ScreenerError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_no_cache_and_failed_fetch_is_upstream_unavailable() {
        let provider = DirectoryProvider::new();
        provider.failing.store(true, Ordering::SeqCst);
        let store = Arc::new(InMemorySymbolStore::new());
        let cache = SymbolCache::new(
            store.clone(),
            provider,
            Arc::new(ManualClock::new(start())),
            Duration::hours(24),
        );

        match cache.get_universe("US").await {
            Err(ScreenerError::UpstreamUnavailable { exchange, cause }) => {
                assert_eq!(exchange, "US");
                assert!(cause.contains("Connection failed"));
            }
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
        assert!(store.is_empty());
    }

    fn poisoned_store() -> Arc<InMemorySymbolStore> {
        let store = Arc::new(InMemorySymbolStore::new());
        let writer = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.entries.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        store
    }

    #[tokio::test]
    async fn test_poisoned_store_reports_storage_error() {
        let store = poisoned_store();
        let set = CachedSymbolSet {
            symbols: vec![SymbolRecord::new("JPM")],
            fetched_at: start(),
        };

        assert!(matches!(store.put("US", &set).await, Err(Error::Storage(_))));
        assert!(matches!(store.get("US").await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_poisoned_store_still_returns_fetched_universe() {
        let provider = DirectoryProvider::new();
        let cache = SymbolCache::new(
            poisoned_store(),
            provider.clone(),
            Arc::new(ManualClock::new(start())),
            Duration::hours(24),
        );

        let first = cache.get_universe("US").await.unwrap();
        let second = cache.get_universe("US").await.unwrap();

        assert_eq!(first[0].symbol, "SYM1");
        assert_eq!(second[0].symbol, "SYM2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
