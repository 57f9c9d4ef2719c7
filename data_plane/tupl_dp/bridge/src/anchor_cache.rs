//! Encoded anchors per boundary, keyed by tenant and boundary id and
//! validated by content hash.
//!
//! Readers clone an `Arc` of the current snapshot map and never block on
//! encoding. A miss takes a per-key in-flight lock, so concurrent misses on
//! one boundary encode once while other boundaries encode in parallel. Only
//! the copy-on-write publish is serialized. Entries are immutable once
//! published; a stale content hash is a miss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::anchors::{build_anchors, AnchorTruncation};
use crate::boundary::Boundary;
use crate::encoding::SlotEncoder;
use crate::error::Result;
use crate::rule_vector::RuleVector;
use crate::types::now_ms;

#[derive(Debug, Clone)]
pub struct CachedAnchors {
    pub boundary_id: String,
    pub tenant_id: Option<String>,
    pub content_hash: String,
    pub rule_vector: RuleVector,
    pub truncations: Vec<AnchorTruncation>,
    pub encoded_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// `(tenant_id, boundary_id)`; boundary ids are only unique per tenant.
pub type CacheKey = (Option<String>, String);

type Snapshot = Arc<HashMap<CacheKey, Arc<CachedAnchors>>>;

fn key_of(boundary: &Boundary) -> CacheKey {
    (boundary.tenant_id.clone(), boundary.id.clone())
}

#[derive(Default)]
pub struct AnchorCache {
    entries: RwLock<Snapshot>,
    write_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnchorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Snapshot {
        self.entries.read().clone()
    }

    /// Cached anchors for this exact boundary content, if any.
    pub fn get(&self, boundary: &Boundary) -> Option<Arc<CachedAnchors>> {
        self.lookup(&key_of(boundary), &boundary.content_hash())
    }

    fn lookup(&self, key: &CacheKey, content_hash: &str) -> Option<Arc<CachedAnchors>> {
        self.snapshot()
            .get(key)
            .filter(|entry| entry.content_hash == content_hash)
            .cloned()
    }

    pub fn contains(&self, tenant_id: Option<&str>, boundary_id: &str) -> bool {
        let key = (tenant_id.map(str::to_string), boundary_id.to_string());
        self.snapshot().contains_key(&key)
    }

    /// Return cached anchors, encoding the boundary on a miss.
    pub async fn get_or_encode(
        &self,
        boundary: &Boundary,
        encoder: &SlotEncoder,
    ) -> Result<Arc<CachedAnchors>> {
        let key = key_of(boundary);
        let content_hash = boundary.content_hash();
        if let Some(entry) = self.lookup(&key, &content_hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }

        let key_lock = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let _in_flight = key_lock.lock().await;
        if let Some(entry) = self.lookup(&key, &content_hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let texts = build_anchors(boundary);
        let rule_vector = match encoder.encode_anchors(&texts).await {
            Ok(rule_vector) => rule_vector,
            Err(err) => {
                self.in_flight.lock().remove(&key);
                return Err(err);
            }
        };
        let entry = Arc::new(CachedAnchors {
            boundary_id: boundary.id.clone(),
            tenant_id: boundary.tenant_id.clone(),
            content_hash,
            rule_vector,
            truncations: texts.truncated,
            encoded_at_ms: now_ms(),
        });

        debug!(
            "Encoded anchors for boundary '{}': counts {:?}",
            boundary.id,
            entry.rule_vector.anchor_counts()
        );

        {
            let _guard = self.write_lock.lock().await;
            self.publish(|map| {
                map.insert(key.clone(), entry.clone());
            });
        }
        self.in_flight.lock().remove(&key);
        Ok(entry)
    }

    /// Drop every entry of `tenant_id` whose boundary id is not in `keep`.
    /// Returns the number of evicted entries.
    pub async fn evict_tenant_except(&self, tenant_id: &str, keep: &[String]) -> usize {
        let _guard = self.write_lock.lock().await;
        let mut evicted = 0;
        self.publish(|map| {
            let before = map.len();
            map.retain(|(tenant, id), _| tenant.as_deref() != Some(tenant_id) || keep.contains(id));
            evicted = before - map.len();
        });
        evicted
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        *self.entries.write() = Arc::new(HashMap::new());
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> AnchorCacheStats {
        AnchorCacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Copy-on-write swap. Callers hold `write_lock`.
    fn publish(&self, update: impl FnOnce(&mut HashMap<CacheKey, Arc<CachedAnchors>>)) {
        let mut next = (*self.snapshot()).clone();
        update(&mut next);
        *self.entries.write() = Arc::new(next);
    }
}
