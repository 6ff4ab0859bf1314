//! Substitution verdict cache
//!
//! The resolver runs on every inventory refresh, so the same
//! `(requirement, candidate)` pairs are asked over and over. Verdicts the
//! service returned are kept for a configurable TTL; failed lookups are never
//! stored, so a recovered service is asked again on the next pass.
//!
//! ```rust
//! use std::time::Duration;
//! use stockpit_core::cache::VerdictCache;
//! use stockpit_core::model::SubstitutionVerdict;
//!
//! let verdicts = VerdictCache::new(Duration::from_secs(300));
//! verdicts.insert("Boter", "margarine", SubstitutionVerdict::rejected());
//! assert!(verdicts.get("boter", " Margarine ").is_some());
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::SubstitutionVerdict;

/// Key of a substitution verdict: both names lowercased and trimmed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerdictKey {
    pub requirement: String,
    pub candidate: String,
}

impl VerdictKey {
    pub fn new(requirement: &str, candidate: &str) -> Self {
        Self {
            requirement: requirement.trim().to_lowercase(),
            candidate: candidate.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedVerdict {
    verdict: SubstitutionVerdict,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CachedVerdict {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Live and expired entries still held
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 before the first lookup
    pub hit_rate: f64,
}

/// Substitution verdicts shared across resolutions.
///
/// Filled through `&self`; locks are never held across an await.
pub struct VerdictCache {
    entries: RwLock<HashMap<VerdictKey, CachedVerdict>>,
    stats: RwLock<CacheStats>,
    ttl: Duration,
}

impl VerdictCache {
    /// A zero `ttl` disables caching
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            ttl,
        }
    }

    pub fn get(&self, requirement: &str, candidate: &str) -> Option<SubstitutionVerdict> {
        let key = VerdictKey::new(requirement, candidate);
        let hit = self
            .entries
            .read()
            .get(&key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.verdict.clone());

        let mut stats = self.stats.write();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    /// Cache a verdict the service actually returned
    pub fn insert(&self, requirement: &str, candidate: &str, verdict: SubstitutionVerdict) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.write().insert(
            VerdictKey::new(requirement, candidate),
            CachedVerdict {
                verdict,
                expires_at: Instant::now().checked_add(self.ttl),
            },
        );
    }

    /// Drop expired verdicts
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));

        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Verdict cache cleanup removed {} expired entries", removed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.entries = self.len();
        let total = stats.hits + stats.misses;
        if total > 0 {
            stats.hit_rate = stats.hits as f64 / total as f64;
        }
        stats
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        *self.stats.write() = CacheStats::default();
    }
}
