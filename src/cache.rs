//! Caller-owned cache of fetched price tables.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::data::model::RawSeries;
use crate::source::PriceQuery;

/// Cache key for one retrieval: ticker (upper-cased) and date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<&PriceQuery> for CacheKey {
    fn from(query: &PriceQuery) -> Self {
        Self {
            ticker: query.ticker.trim().to_ascii_uppercase(),
            start: query.start,
            end: query.end,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    series: Arc<RawSeries>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory read-through cache with a fixed time-to-live.
///
/// A TTL of zero disables it: nothing is stored and every lookup misses.
#[derive(Debug)]
pub struct SeriesCache {
    map: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    /// The cached table for `key`, if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<RawSeries>> {
        self.map
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| Arc::clone(&entry.series))
    }

    pub fn put(&mut self, key: CacheKey, series: Arc<RawSeries>) {
        if self.is_disabled() {
            return;
        }
        let expires_at = Instant::now().checked_add(self.ttl);
        self.map.insert(key, CacheEntry { series, expires_at });
    }

    /// Return the cached table or fetch, store and return a fresh one.
    ///
    /// Fetch errors are passed through and nothing is cached for them.
    pub fn get_or_fetch<E>(
        &mut self,
        key: CacheKey,
        fetch: impl FnOnce() -> Result<RawSeries, E>,
    ) -> Result<Arc<RawSeries>, E> {
        if let Some(series) = self.get(&key) {
            log::debug!("cache hit for {key:?}");
            return Ok(series);
        }
        log::debug!("cache miss for {key:?}");

        let series = Arc::new(fetch()?);
        self.put(key, Arc::clone(&series));
        Ok(series)
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.map.remove(key).is_some()
    }

    /// Remove expired entries.
    pub fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.is_live(now));
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Counter;

    fn key(ticker: &str) -> CacheKey {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CacheKey::from(&PriceQuery::new(ticker, d, d))
    }

    fn table() -> RawSeries {
        RawSeries::empty(vec!["Date".into(), "Close".into()])
    }

    #[test]
    fn fetches_once_then_serves_from_cache() {
        let mut cache = SeriesCache::new(Duration::from_secs(60));
        let calls = Counter::new(0);
        let fetch = || -> Result<RawSeries, ()> {
            calls.set(calls.get() + 1);
            Ok(table())
        };

        cache.get_or_fetch(key("aapl"), fetch).unwrap();
        cache.get_or_fetch(key("AAPL "), fetch).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = SeriesCache::new(Duration::from_secs(60));
        let result: Result<_, &str> = cache.get_or_fetch(key("AAPL"), || Err("offline"));
        assert_eq!(result.unwrap_err(), "offline");
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_expire() {
        let mut cache = SeriesCache::new(Duration::from_millis(30));
        cache.put(key("AAPL"), Arc::new(table()));
        assert!(cache.get(&key("AAPL")).is_some());

        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key("AAPL")).is_none());
        assert_eq!(cache.len(), 1);
        cache.clear_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn huge_ttl_never_expires() {
        let mut cache = SeriesCache::new(Duration::MAX);
        cache.put(key("AAPL"), Arc::new(table()));
        assert!(cache.get(&key("AAPL")).is_some());
        cache.clear_expired();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_and_disable() {
        let mut cache = SeriesCache::new(Duration::from_secs(60));
        cache.put(key("AAPL"), Arc::new(table()));
        assert!(cache.invalidate(&key("aapl")));
        assert!(!cache.invalidate(&key("aapl")));

        let mut off = SeriesCache::disabled();
        off.put(key("AAPL"), Arc::new(table()));
        assert!(off.is_empty());
        assert!(off.get(&key("AAPL")).is_none());
    }
}
