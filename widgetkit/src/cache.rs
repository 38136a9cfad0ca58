//! Single-slot TTL cache.
//!
//! Each widget handler owns exactly one `TtlCache`. Expired values are kept
//! around so the handler can fall back to them when a refresh fails; the only
//! way a value leaves the cache is by being overwritten.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};

/// Freshness of the cached value at the time of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing has been stored yet.
    Miss,
    /// A value is stored and `now <= expires_at`.
    Fresh,
    /// A value is stored but `now > expires_at`.
    Stale,
}

/// Result of [`TtlCache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Miss,
    Fresh { value: T, expires_at: DateTime<Utc> },
    Stale { value: T, expires_at: DateTime<Utc> },
}

impl<T> CacheLookup<T> {
    pub const fn state(&self) -> CacheState {
        match self {
            Self::Miss => CacheState::Miss,
            Self::Fresh { .. } => CacheState::Fresh,
            Self::Stale { .. } => CacheState::Stale,
        }
    }

    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Miss => None,
            Self::Fresh { expires_at, .. } | Self::Stale { expires_at, .. } => {
                Some(*expires_at)
            }
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Miss => None,
            Self::Fresh { value, .. } | Self::Stale { value, .. } => Some(value),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<T> {
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }
}

impl<T: Clone> TtlCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached value as of `now`.
    pub fn get(&self, now: DateTime<Utc>) -> CacheLookup<T> {
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        match entry.as_ref() {
            None => CacheLookup::Miss,
            Some(entry) if now > entry.expires_at => CacheLookup::Stale {
                value: entry.value.clone(),
                expires_at: entry.expires_at,
            },
            Some(entry) => CacheLookup::Fresh {
                value: entry.value.clone(),
                expires_at: entry.expires_at,
            },
        }
    }

    /// Replace whatever is stored with `value`, valid until `expires_at`.
    pub fn set(&self, value: T, expires_at: DateTime<Utc>) {
        let mut entry =
            self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        *entry = Some(CacheEntry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_unset_cache_is_a_miss() {
        let cache = TtlCache::<String>::new();

        let lookup = cache.get(t0());

        assert_eq!(lookup, CacheLookup::Miss);
        assert_eq!(lookup.state(), CacheState::Miss);
        assert_eq!(lookup.expires_at(), None);
    }

    #[test]
    fn test_fresh_until_expiry_inclusive() {
        let cache = TtlCache::new();
        let exp = t0() + TimeDelta::minutes(5);
        cache.set("a".to_string(), exp);

        assert_eq!(
            cache.get(t0()),
            CacheLookup::Fresh {
                value: "a".to_string(),
                expires_at: exp
            }
        );
        // the boundary itself still counts as fresh
        assert_eq!(cache.get(exp).state(), CacheState::Fresh);
    }

    #[test]
    fn test_expired_value_is_retained_as_stale() {
        let cache = TtlCache::new();
        let exp = t0() + TimeDelta::minutes(5);
        cache.set(42_u32, exp);

        let later = exp + TimeDelta::seconds(1);
        let lookup = cache.get(later);

        assert_eq!(lookup.state(), CacheState::Stale);
        assert_eq!(lookup.expires_at(), Some(exp));
        assert_eq!(lookup.into_value(), Some(42));

        // reading a stale entry does not clear it
        let much_later = exp + TimeDelta::days(3);
        assert_eq!(cache.get(much_later).into_value(), Some(42));
    }

    #[test]
    fn test_set_overwrites_value_and_expiry() {
        let cache = TtlCache::new();
        cache.set(1_u32, t0());
        let exp = t0() + TimeDelta::minutes(10);
        cache.set(2_u32, exp);

        assert_eq!(
            cache.get(t0() + TimeDelta::minutes(1)),
            CacheLookup::Fresh {
                value: 2,
                expires_at: exp
            }
        );
    }

    #[test]
    fn test_repeated_set_is_idempotent() {
        let once = TtlCache::new();
        let twice = TtlCache::new();
        let exp = t0() + TimeDelta::minutes(5);

        once.set(vec![1, 2, 3], exp);
        twice.set(vec![1, 2, 3], exp);
        twice.set(vec![1, 2, 3], exp);

        let now = t0() + TimeDelta::minutes(1);
        assert_eq!(once.get(now), twice.get(now));
    }

    #[test]
    fn test_concurrent_get_and_set() {
        let cache = Arc::new(TtlCache::new());
        let exp = t0() + TimeDelta::minutes(5);

        let handles: Vec<_> = (0..8_u32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.set(i, exp);
                        let lookup = cache.get(t0());
                        assert_eq!(lookup.state(), CacheState::Fresh);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.get(t0()).into_value().is_some_and(|v| v < 8));
    }
}
