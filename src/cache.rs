//! TTL memoization for metric reads. One cache entry per (selector, metric,
//! filter) tuple; the clock is injected so expiry is testable without
//! sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{Metric, MetricFilter, MetricRecord, RegionSelector};

/// Upstream stores are expensive and the numbers move slowly, so entries
/// live for eight hours unless invalidated by a manual refresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(8 * 60 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub selector: RegionSelector,
    pub metric: Metric,
    pub filter: MetricFilter,
}

struct Entry {
    record: MetricRecord,
    stored_at: DateTime<Utc>,
}

struct Inner {
    entries: HashMap<CacheKey, Entry>,
    last_refresh: Option<DateTime<Utc>>,
}

pub struct MetricCache {
    inner: Mutex<Inner>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl MetricCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        // DEFAULT_TTL and any sane override fit chrono's range.
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_refresh: None,
            }),
            ttl,
            clock,
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL, Arc::new(SystemClock))
    }

    /// Renders must not raise, so a poisoned lock recovers the inner state
    /// rather than panicking.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve the memoized record when it is younger than the TTL, otherwise
    /// run `compute` and store the result.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> MetricRecord
    where
        F: FnOnce() -> MetricRecord,
    {
        let now = self.clock.now();
        {
            let inner = self.lock();
            if let Some(entry) = inner.entries.get(&key) {
                if now - entry.stored_at < self.ttl {
                    return entry.record.clone();
                }
            }
        }
        // The lock is not held across the upstream call; a concurrent miss
        // on the same key computes twice and the last write wins.
        let record = compute();
        let mut inner = self.lock();
        inner.entries.insert(
            key,
            Entry {
                record: record.clone(),
                stored_at: now,
            },
        );
        record
    }

    /// Drop every memoized entry in one step and stamp the freshness
    /// timestamp. Readers never observe a partially cleared cache.
    pub fn invalidate_all(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.entries.clear();
        inner.last_refresh = Some(now);
    }

    /// Timestamp of the last refresh, initialized lazily to the first time
    /// anyone asks.
    pub fn last_refresh(&self) -> DateTime<Utc> {
        let mut inner = self.lock();
        *inner
            .last_refresh
            .get_or_insert_with(|| self.clock.now())
    }

    /// Freshness label as rendered in the dashboard footer, e.g.
    /// "26 Aug 2026, 09:15 AM".
    pub fn freshness_label(&self) -> String {
        self.last_refresh().format("%d %b %Y, %I:%M %p").to_string()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
