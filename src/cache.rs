//! Short-lived result cache for finished mindmaps.
//!
//! Keys are hashed before storage so arbitrarily large source identifiers
//! (e.g. the full input text) stay bounded in memory. Entries expire a fixed
//! TTL after `set`; expiry is lazy — an expired entry is evicted by the next
//! `get` that touches it, there is no sweeper task.
//!
//! The map is shared across concurrent requests. `get`/`set` are atomic per
//! key; cross-key operations carry no ordering guarantee.

use crate::graph::ConceptGraph;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

/// The value memoized per source: the merged graph plus ancillary text.
#[derive(Debug, Clone)]
pub struct CachedMindmap {
    pub graph: ConceptGraph,
    pub title: String,
    pub source_text: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedMindmap,
    expires_at: DateTime<Utc>,
}

/// In-process TTL cache keyed by hashed source identifier.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Normalize a source identifier into a bounded cache key.
    pub fn key_for(identifier: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Return the cached value if present and not expired.
    ///
    /// An expired entry is evicted here and reported absent.
    pub fn get(&self, key: &str) -> Option<CachedMindmap> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.expires_at > Utc::now() {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Store a value under the key with a fresh TTL.
    pub fn set(&self, key: impl Into<String>, value: CachedMindmap) {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        self.entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
