// =============================================================================
// Analysis Cache — TTL map of generated narratives keyed by fingerprint
// =============================================================================
//
// The fingerprint is lossy: price rounded to 3 dp plus three coarse indicator
// readings. Market states that round to the same key share one cached
// narrative until it expires.
//
// Expiry is lazy. `get_fresh` ignores entries at or past the TTL, and
// `sweep_expired` is called on every miss to drop them. Entries are only ever
// read past expiry through `get_any`, the stale fallback after a timeout.
//
// Uses `tokio::time::Instant` so tests can drive the clock with
// `tokio::time::advance`.
// =============================================================================

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use crate::analysis::snapshot::FormattedSnapshot;
use crate::types::Narratives;

/// A cached set of narratives and the instant they were generated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub narratives: Narratives,
    pub created_at: Instant,
}

impl CacheEntry {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

pub struct AnalysisCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry for `key` if it is younger than the TTL.
    pub fn get_fresh(&self, key: &str, now: Instant) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|e| e.age(now) < self.ttl)
    }

    /// Entry for `key` regardless of age.
    pub fn get_any(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Insert or overwrite the entry for `key`.
    pub fn insert(&mut self, key: String, narratives: Narratives, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                narratives,
                created_at: now,
            },
        );
    }

    /// Drop every expired entry except `keep`, which is about to be
    /// regenerated and must stay reachable as a stale fallback. Returns the
    /// number of entries evicted.
    pub fn sweep_expired(&mut self, now: Instant, keep: &str) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|key, entry| key == keep || entry.age(now) < ttl);
        before - self.entries.len()
    }
}

/// Cache key: `"{price:.3}_{very-short RSI}_{short MACD trend}_{long confluence}"`.
///
/// Fields from timeframes without a snapshot are empty, so a request with no
/// usable candles keys on price alone.
pub fn fingerprint(
    price: f64,
    very_short: &FormattedSnapshot,
    short: &FormattedSnapshot,
    long: &FormattedSnapshot,
) -> String {
    format!(
        "{price:.3}_{}_{}_{}",
        very_short.rsi, short.macd_trend, long.confluence_score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narratives(tag: &str) -> Narratives {
        Narratives {
            very_short_term: format!("{tag}-vs"),
            short_term: format!("{tag}-s"),
            long_term: format!("{tag}-l"),
        }
    }

    #[test]
    fn fresh_until_ttl() {
        let start = Instant::now();
        let mut cache = AnalysisCache::new(Duration::from_secs(300));
        cache.insert("k".into(), narratives("a"), start);

        assert!(cache.get_fresh("k", start + Duration::from_secs(299)).is_some());
        assert!(cache.get_fresh("k", start + Duration::from_secs(300)).is_none());
        assert!(cache.get_any("k").is_some());
    }

    #[test]
    fn insert_overwrites_single_entry() {
        let start = Instant::now();
        let mut cache = AnalysisCache::new(Duration::from_secs(300));
        cache.insert("k".into(), narratives("a"), start);
        let later = start + Duration::from_secs(10);
        cache.insert("k".into(), narratives("b"), later);

        assert_eq!(cache.len(), 1);
        let entry = cache.get_any("k").unwrap();
        assert_eq!(entry.narratives.short_term, "b-s");
        assert_eq!(entry.created_at, later);
    }

    #[test]
    fn sweep_evicts_expired_but_spares_kept_key() {
        let start = Instant::now();
        let mut cache = AnalysisCache::new(Duration::from_secs(300));
        cache.insert("old".into(), narratives("a"), start);
        cache.insert("kept".into(), narratives("b"), start);
        cache.insert("young".into(), narratives("c"), start + Duration::from_secs(200));

        let evicted = cache.sweep_expired(start + Duration::from_secs(301), "kept");
        assert_eq!(evicted, 1);
        assert!(cache.get_any("old").is_none());
        assert!(cache.get_any("kept").is_some());
        assert!(cache.get_any("young").is_some());
    }

    #[test]
    fn fingerprint_layout() {
        let vs = FormattedSnapshot {
            rsi: "41.27".into(),
            ..Default::default()
        };
        let s = FormattedSnapshot {
            macd_trend: "BULLISH".into(),
            ..Default::default()
        };
        let l = FormattedSnapshot {
            confluence_score: "3/5 BEARISH".into(),
            ..Default::default()
        };
        assert_eq!(
            fingerprint(0.45126, &vs, &s, &l),
            "0.451_41.27_BULLISH_3/5 BEARISH"
        );
    }

    #[test]
    fn fingerprint_is_coarse_on_price() {
        let empty = FormattedSnapshot::default();
        assert_eq!(
            fingerprint(0.45121, &empty, &empty, &empty),
            fingerprint(0.45139, &empty, &empty, &empty)
        );
        assert_eq!(fingerprint(1.0, &empty, &empty, &empty), "1.000___");
    }
}
