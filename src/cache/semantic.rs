use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use super::config::CacheConfig;
use super::error::{CacheError, CacheResult};
use super::types::{CacheEntry, CacheHit, CacheStats};
use crate::vector::{cosine_similarity, is_well_formed};

struct Inner<T> {
    entries: HashMap<u64, CacheEntry<T>>,
    next_id: u64,
}

/// Answer cache keyed by query meaning.
///
/// Lookups scan under the read lock and take the write lock only to bump the winner's
/// statistics, re-checking that the entry still exists. Entry ids are never reused, so a
/// lookup racing an eviction sees a miss rather than a different entry.
pub struct SemanticCache<T> {
    config: CacheConfig,
    inner: RwLock<Inner<T>>,
    stats: Mutex<CacheStats>,
}

impl<T: Clone> SemanticCache<T> {
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(Inner {
                entries: HashMap::with_capacity(config.capacity.min(4_096)),
                next_id: 1,
            }),
            config,
            stats: Mutex::new(CacheStats::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn lookup(&self, embedding: &[f32], variant: u64) -> Option<CacheHit<T>> {
        self.lookup_at(embedding, variant, Utc::now())
    }

    /// Best live entry with similarity ≥ threshold; ties go to the most recently accessed.
    ///
    /// Entries whose vector is malformed or of a different dimension are purged and
    /// never returned.
    #[instrument(skip(self, embedding), fields(dim = embedding.len()))]
    pub fn lookup_at(
        &self,
        embedding: &[f32],
        variant: u64,
        now: DateTime<Utc>,
    ) -> Option<CacheHit<T>> {
        if !is_well_formed(embedding) {
            self.stats.lock().misses += 1;
            return None;
        }

        let mut corrupt = Vec::new();
        let mut best: Option<(u64, f32, DateTime<Utc>)> = None;
        {
            let inner = self.inner.read();
            for entry in inner.entries.values() {
                if entry.variant != variant || entry.is_expired(now) {
                    continue;
                }
                if entry.query_embedding.len() != embedding.len()
                    || !is_well_formed(&entry.query_embedding)
                {
                    corrupt.push(entry.id);
                    continue;
                }
                let similarity = if entry.query_embedding.as_slice() == embedding {
                    1.0
                } else {
                    cosine_similarity(embedding, &entry.query_embedding)
                };
                if similarity < self.config.similarity_threshold {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, best_sim, best_accessed)) => {
                        similarity > best_sim
                            || (similarity == best_sim && entry.last_accessed_at > best_accessed)
                    }
                };
                if better {
                    best = Some((entry.id, similarity, entry.last_accessed_at));
                }
            }
        }

        if !corrupt.is_empty() {
            self.purge(&corrupt);
        }

        let hit = best.and_then(|(id, similarity, _)| {
            let mut inner = self.inner.write();
            let entry = inner.entries.get_mut(&id)?;
            if entry.is_expired(now) {
                return None;
            }
            entry.hit_count += 1;
            entry.last_accessed_at = now;
            Some(CacheHit {
                entry_id: id,
                payload: entry.payload.clone(),
                similarity,
                matched_query: entry.normalized_query.clone(),
                hit_count: entry.hit_count,
            })
        });

        let mut stats = self.stats.lock();
        match &hit {
            Some(h) => {
                stats.hits += 1;
                debug!(similarity = h.similarity, matched = %h.matched_query, "semantic cache hit");
            }
            None => stats.misses += 1,
        }
        hit
    }

    pub fn insert(
        &self,
        embedding: Vec<f32>,
        normalized_query: impl Into<String>,
        variant: u64,
        payload: T,
    ) -> CacheResult<u64> {
        self.insert_at(embedding, normalized_query, variant, payload, Utc::now())
    }

    /// Inserts, first evicting the least valuable entry if at capacity.
    pub fn insert_at(
        &self,
        embedding: Vec<f32>,
        normalized_query: impl Into<String>,
        variant: u64,
        payload: T,
        now: DateTime<Utc>,
    ) -> CacheResult<u64> {
        if !is_well_formed(&embedding) {
            return Err(CacheError::InvalidEmbedding {
                reason: "empty or non-finite vector".to_string(),
            });
        }
        let ttl = chrono::Duration::from_std(self.config.ttl).map_err(|e| {
            CacheError::InvalidConfig {
                reason: e.to_string(),
            }
        })?;

        let mut evicted = 0u64;
        let id = {
            let mut inner = self.inner.write();
            while inner.entries.len() >= self.config.capacity {
                let Some(victim) = Self::least_valuable(&inner.entries, now) else {
                    break;
                };
                inner.entries.remove(&victim);
                evicted += 1;
            }

            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.insert(
                id,
                CacheEntry {
                    id,
                    query_embedding: embedding,
                    normalized_query: normalized_query.into(),
                    payload,
                    variant,
                    created_at: now,
                    expires_at: now + ttl,
                    hit_count: 0,
                    last_accessed_at: now,
                },
            );
            id
        };

        let mut stats = self.stats.lock();
        stats.inserts += 1;
        stats.evictions += evicted;
        if evicted > 0 {
            debug!(evicted, "evicted least valuable cache entries");
        }
        Ok(id)
    }

    fn least_valuable(entries: &HashMap<u64, CacheEntry<T>>, now: DateTime<Utc>) -> Option<u64> {
        entries
            .values()
            .min_by(|a, b| {
                a.value(now)
                    .partial_cmp(&b.value(now))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|e| e.id)
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let removed = {
            let mut inner = self.inner.write();
            let before = inner.entries.len();
            inner.entries.retain(|_, e| !e.is_expired(now));
            before - inner.entries.len()
        };
        if removed > 0 {
            self.stats.lock().expirations += removed as u64;
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    fn purge(&self, ids: &[u64]) {
        let removed = {
            let mut inner = self.inner.write();
            ids.iter()
                .filter(|id| inner.entries.remove(*id).is_some())
                .count()
        };
        if removed > 0 {
            warn!(removed, "purged corrupt cache entries");
            self.stats.lock().corruptions += removed as u64;
        }
    }

    pub fn get(&self, id: u64) -> Option<CacheEntry<T>> {
        self.inner.read().entries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = *self.stats.lock();
        stats.entries = self.len();
        stats
    }

    /// Test hook: stores an entry verbatim, bypassing insert validation.
    #[cfg(any(test, feature = "mock"))]
    pub fn insert_raw(&self, mut entry: CacheEntry<T>) -> u64 {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        entry.id = id;
        inner.entries.insert(id, entry);
        id
    }
}

impl<T> std::fmt::Debug for SemanticCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("entries", &self.inner.read().entries.len())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}
