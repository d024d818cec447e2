//! Cache engine: admits and evicts block descriptors under a byte budget.
//!
//! All state lives behind one mutex. A [`BlockCache::access`] call holds it
//! for the whole operation, including the re-sort of the eviction order, so no
//! caller can observe a half-updated or not-yet-reordered cache.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::descriptor::{BlockId, Descriptor};
use crate::cache::policy::EvictionPolicy;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::stats::{CacheDump, CacheStats, StatsSink};

/// Operations accepted by [`BlockCache::access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    Get,
    Put,
}

impl FromStr for CacheOp {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(CacheOp::Get),
            "PUT" => Ok(CacheOp::Put),
            _ => Err(CacheError::UnsupportedOperation(s.to_string())),
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOp::Get => write!(f, "GET"),
            CacheOp::Put => write!(f, "PUT"),
        }
    }
}

/// Result of a GET. A miss is `block_id: None, size: 0, etag: ""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lookup {
    pub block_id: Option<BlockId>,
    pub size: u64,
    pub etag: String,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        self.block_id.is_some()
    }
}

/// Result of [`BlockCache::access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResult {
    /// The cache is disabled; nothing was done.
    Disabled,
    /// Outcome of a GET.
    Get(Lookup),
    /// Block ids evicted by a PUT (possibly empty).
    Put(Vec<BlockId>),
}

/// Mutable cache state. Only touched with the engine lock held.
#[derive(Debug, Default)]
struct CacheState {
    /// Descriptors keyed by block id.
    entries: HashMap<BlockId, Descriptor>,

    /// Same keys as `entries`, most-preferred first. Victims come off the tail.
    order: Vec<BlockId>,

    /// Sum of `size` over `entries`.
    cache_size_bytes: u64,

    /// Logical clock for `last_access`.
    clock: u64,

    get_hits: u64,
    put_hits: u64,
    misses: u64,
    evictions: u64,
    reads: u64,
    writes: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(
        &mut self,
        block_id: &str,
        size: u64,
        etag: &str,
        capacity: u64,
    ) -> Result<Vec<BlockId>, CacheError> {
        self.writes += 1;
        let now = self.tick();

        // No single block, new or updated, may reach the budget on its own.
        if size >= capacity {
            warn!(block_id, size, capacity, "Rejecting block larger than cache capacity");
            return Err(CacheError::OversizedBlock {
                block_id: block_id.to_string(),
                size,
                capacity,
            });
        }

        // Updates never evict, even when the new size overshoots the budget.
        if let Some(desc) = self.entries.get_mut(block_id) {
            let others = self.cache_size_bytes.checked_sub(desc.size).ok_or_else(|| {
                CacheError::InternalConsistency(format!(
                    "block {block_id} holds {} bytes of a {} byte total",
                    desc.size, self.cache_size_bytes
                ))
            })?;
            let total = others
                .checked_add(size)
                .ok_or_else(|| CacheError::OversizedBlock {
                    block_id: block_id.to_string(),
                    size,
                    capacity,
                })?;
            self.cache_size_bytes = total;
            desc.size = size;
            desc.etag = etag.to_string();
            desc.put_hit(now);
            self.put_hits += 1;
            self.check_consistency()?;
            return Ok(Vec::new());
        }

        let mut evicted = Vec::new();
        while self.cache_size_bytes.saturating_add(size) >= capacity {
            let victim_id = self.order.pop().ok_or_else(|| {
                CacheError::InternalConsistency(format!(
                    "{} bytes accounted with no entries left to evict",
                    self.cache_size_bytes
                ))
            })?;
            let victim = self.entries.remove(&victim_id).ok_or_else(|| {
                CacheError::InternalConsistency(format!(
                    "block {victim_id} in eviction order but not in index"
                ))
            })?;

            self.cache_size_bytes = self.cache_size_bytes.checked_sub(victim.size).ok_or_else(|| {
                CacheError::InternalConsistency(format!(
                    "evicting {} bytes from a cache holding {}",
                    victim.size, self.cache_size_bytes
                ))
            })?;
            self.evictions += 1;

            debug!(
                block_id = %victim_id,
                size = victim.size,
                get_hits = victim.get_hits,
                last_access = victim.last_access,
                "Evicted block"
            );
            evicted.push(victim_id);
        }

        if !evicted.is_empty() {
            info!(
                evicted = evicted.len(),
                admitted = block_id,
                cache_size_bytes = self.cache_size_bytes,
                "Eviction round complete"
            );
        }

        self.entries
            .insert(block_id.to_string(), Descriptor::new(block_id, size, etag, now));
        self.order.push(block_id.to_string());
        self.cache_size_bytes += size;

        self.check_consistency()?;
        Ok(evicted)
    }

    fn get(&mut self, block_id: &str) -> Lookup {
        self.reads += 1;
        let now = self.tick();

        match self.entries.get_mut(block_id) {
            Some(desc) => {
                desc.get_hit(now);
                self.get_hits += 1;
                Lookup {
                    block_id: Some(desc.block_id.clone()),
                    size: desc.size,
                    etag: desc.etag.clone(),
                }
            }
            None => {
                self.misses += 1;
                Lookup::default()
            }
        }
    }

    fn reorder(&mut self, policy: EvictionPolicy) {
        policy.sort(&mut self.order, &self.entries);
    }

    fn check_consistency(&self) -> Result<(), CacheError> {
        if self.entries.len() != self.order.len() {
            return Err(CacheError::InternalConsistency(format!(
                "index holds {} entries but eviction order holds {}",
                self.entries.len(),
                self.order.len()
            )));
        }
        debug_assert_eq!(
            self.cache_size_bytes,
            self.entries.values().map(|d| d.size).sum::<u64>(),
            "cache_size_bytes drifted from the sum of entry sizes"
        );
        Ok(())
    }

    fn stats(&self, capacity: u64) -> CacheStats {
        CacheStats {
            get_hits: self.get_hits,
            put_hits: self.put_hits,
            misses: self.misses,
            evictions: self.evictions,
            reads: self.reads,
            writes: self.writes,
            cache_size_bytes: self.cache_size_bytes,
            entries: self.entries.len(),
            capacity_bytes: capacity,
        }
    }
}

/// Size-bounded metadata cache for blocks.
pub struct BlockCache {
    enabled: bool,
    capacity: u64,
    policy: EvictionPolicy,
    state: Mutex<CacheState>,
}

impl BlockCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            capacity: config.capacity_bytes,
            policy: config.policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::InternalConsistency("cache lock poisoned".to_string()))
    }

    /// Single entry point for cache operations.
    ///
    /// `size` is the byte count of the block for PUT and ignored for GET;
    /// `etag` is likewise only used by PUT.
    pub fn access(
        &self,
        op: CacheOp,
        block_id: &str,
        size: u64,
        etag: &str,
    ) -> Result<AccessResult, CacheError> {
        if !self.enabled {
            return Ok(AccessResult::Disabled);
        }

        let mut state = self.lock()?;
        let result = match op {
            CacheOp::Put => AccessResult::Put(state.put(block_id, size, etag, self.capacity)?),
            CacheOp::Get => AccessResult::Get(state.get(block_id)),
        };
        state.reorder(self.policy);
        Ok(result)
    }

    /// Like [`access`](Self::access), with the operation given by name ("GET" or "PUT").
    pub fn access_named(
        &self,
        op: &str,
        block_id: &str,
        size: u64,
        etag: &str,
    ) -> Result<AccessResult, CacheError> {
        if !self.enabled {
            return Ok(AccessResult::Disabled);
        }
        self.access(op.parse()?, block_id, size, etag)
    }

    /// Look up a block. Returns an empty [`Lookup`] on a miss or when disabled.
    pub fn get(&self, block_id: &str) -> Result<Lookup, CacheError> {
        match self.access(CacheOp::Get, block_id, 0, "")? {
            AccessResult::Get(lookup) => Ok(lookup),
            _ => Ok(Lookup::default()),
        }
    }

    /// Register a block of `size` bytes, returning the ids evicted to make room.
    pub fn put(&self, block_id: &str, size: u64, etag: &str) -> Result<Vec<BlockId>, CacheError> {
        match self.access(CacheOp::Put, block_id, size, etag)? {
            AccessResult::Put(evicted) => Ok(evicted),
            _ => Ok(Vec::new()),
        }
    }

    /// Copy of a block's descriptor. Does not count as an access.
    pub fn peek(&self, block_id: &str) -> Result<Option<Descriptor>, CacheError> {
        Ok(self.lock()?.entries.get(block_id).cloned())
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.lock()?.stats(self.capacity))
    }

    /// Push a counter snapshot to an external collector. No-op when disabled.
    pub fn write_statistics(&self, sink: &mut dyn StatsSink) -> Result<(), CacheError> {
        if self.enabled {
            sink.record_cache_state(&self.stats()?);
        }
        Ok(())
    }

    /// Counters plus every descriptor, in eviction order (next victim last).
    pub fn dump(&self) -> Result<CacheDump, CacheError> {
        let state = self.lock()?;
        let entries = state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect();
        Ok(CacheDump {
            policy: self.policy,
            stats: state.stats(self.capacity),
            entries,
        })
    }

    /// Number of cached blocks.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Thread-safe handle to a cache.
pub type SharedCache = Arc<BlockCache>;

/// Create a new shareable cache.
pub fn new_shared_cache(config: CacheConfig) -> SharedCache {
    Arc::new(BlockCache::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache(capacity: u64, policy: EvictionPolicy) -> BlockCache {
        BlockCache::new(CacheConfig {
            enabled: true,
            capacity_bytes: capacity,
            policy,
        })
    }

    fn assert_invariants(cache: &BlockCache) {
        let state = cache.state.lock().unwrap();
        assert_eq!(state.entries.len(), state.order.len());
        for id in &state.order {
            assert!(state.entries.contains_key(id));
        }
        let sum: u64 = state.entries.values().map(|d| d.size).sum();
        assert_eq!(state.cache_size_bytes, sum);
        for desc in state.entries.values() {
            assert_eq!(desc.num_accesses, desc.get_hits + desc.put_hits);
        }
    }

    #[test]
    fn test_put_then_get() {
        let cache = test_cache(1000, EvictionPolicy::Lru);
        assert!(cache.put("a", 100, "e1").unwrap().is_empty());

        let lookup = cache.get("a").unwrap();
        assert!(lookup.is_hit());
        assert_eq!(lookup.block_id.as_deref(), Some("a"));
        assert_eq!(lookup.size, 100);
        assert_eq!(lookup.etag, "e1");

        let stats = cache.stats().unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.get_hits, 1);
        assert_eq!(stats.cache_size_bytes, 100);
        assert!(!cache.get("missing").unwrap().is_hit());
        assert_invariants(&cache);
    }

    #[test]
    fn test_order_is_resorted_after_each_access() {
        let cache = test_cache(1000, EvictionPolicy::Lru);
        cache.put("a", 1, "").unwrap();
        cache.put("b", 1, "").unwrap();
        cache.get("a").unwrap();

        let state = cache.state.lock().unwrap();
        assert_eq!(state.order, vec!["a", "b"]);
    }

    #[test]
    fn test_update_corrects_size_total() {
        let cache = test_cache(1000, EvictionPolicy::Lfu);
        cache.put("a", 100, "v1").unwrap();
        cache.put("a", 300, "v2").unwrap();

        assert_eq!(cache.stats().unwrap().cache_size_bytes, 300);
        assert_eq!(cache.peek("a").unwrap().unwrap().etag, "v2");
        assert_invariants(&cache);
    }

    #[test]
    fn test_consistency_fault_detected() {
        let cache = test_cache(1000, EvictionPolicy::Lfu);
        cache.put("a", 10, "").unwrap();
        cache.state.lock().unwrap().order.clear();

        let err = cache.put("b", 10, "").unwrap_err();
        assert!(matches!(err, CacheError::InternalConsistency(_)));
    }

    #[test]
    fn test_evicting_from_empty_order_is_a_fault() {
        let cache = test_cache(100, EvictionPolicy::Lfu);
        cache.state.lock().unwrap().cache_size_bytes = 90;

        let err = cache.put("a", 20, "").unwrap_err();
        assert!(matches!(err, CacheError::InternalConsistency(_)));
    }

    #[test]
    fn test_cache_op_parse() {
        assert_eq!("GET".parse::<CacheOp>().unwrap(), CacheOp::Get);
        assert_eq!("PUT".parse::<CacheOp>().unwrap(), CacheOp::Put);
        assert_eq!(
            "DELETE".parse::<CacheOp>().unwrap_err(),
            CacheError::UnsupportedOperation("DELETE".to_string())
        );
    }
}
