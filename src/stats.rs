//! Statistics export and diagnostic dumps.
//!
//! The engine never decides when statistics are published. Callers take a
//! [`CacheStats`] snapshot (or hand a [`StatsSink`] to
//! [`BlockCache::write_statistics`](crate::cache::engine::BlockCache::write_statistics))
//! whenever their reporting schedule says so.

use std::fmt;

use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use serde::Serialize;

use crate::cache::descriptor::Descriptor;
use crate::cache::policy::EvictionPolicy;

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub get_hits: u64,
    pub put_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub reads: u64,
    pub writes: u64,
    pub cache_size_bytes: u64,
    pub entries: usize,
    pub capacity_bytes: u64,
}

impl CacheStats {
    /// Fraction of GETs that found their block (0.0 when nothing was read).
    pub fn hit_ratio(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.get_hits as f64 / self.reads as f64
    }

    /// Cache usage as a fraction of capacity.
    pub fn usage_fraction(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.cache_size_bytes as f64 / self.capacity_bytes as f64
    }
}

/// An external collector of cache counters.
pub trait StatsSink {
    fn record_cache_state(&mut self, stats: &CacheStats);
}

/// Publishes cache counters as Prometheus gauges.
pub struct PrometheusSink {
    registry: Registry,
    get_hits: IntGauge,
    put_hits: IntGauge,
    misses: IntGauge,
    evictions: IntGauge,
    reads: IntGauge,
    writes: IntGauge,
    cache_size_bytes: IntGauge,
    entries: IntGauge,
}

impl PrometheusSink {
    /// Create a sink with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let gauge = |name: &str, help: &str| -> prometheus::Result<IntGauge> {
            let g = IntGauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };

        Ok(Self {
            get_hits: gauge("block_cache_get_hits", "GET requests that found their block")?,
            put_hits: gauge("block_cache_put_hits", "PUT requests that updated an existing block")?,
            misses: gauge("block_cache_misses", "GET requests for unknown blocks")?,
            evictions: gauge("block_cache_evictions", "Blocks evicted to stay within capacity")?,
            reads: gauge("block_cache_reads", "Total GET requests")?,
            writes: gauge("block_cache_writes", "Total PUT requests")?,
            cache_size_bytes: gauge("block_cache_size_bytes", "Sum of cached block sizes")?,
            entries: gauge("block_cache_entries", "Number of cached blocks")?,
            registry,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn clamp(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl StatsSink for PrometheusSink {
    fn record_cache_state(&mut self, stats: &CacheStats) {
        self.get_hits.set(clamp(stats.get_hits));
        self.put_hits.set(clamp(stats.put_hits));
        self.misses.set(clamp(stats.misses));
        self.evictions.set(clamp(stats.evictions));
        self.reads.set(clamp(stats.reads));
        self.writes.set(clamp(stats.writes));
        self.cache_size_bytes.set(clamp(stats.cache_size_bytes));
        self.entries.set(clamp(stats.entries as u64));
    }
}

/// Human-readable snapshot of counters and entries, in eviction order.
///
/// Meant for operators; the format is not stable.
#[derive(Debug, Clone)]
pub struct CacheDump {
    pub policy: EvictionPolicy,
    pub stats: CacheStats,
    pub entries: Vec<Descriptor>,
}

impl fmt::Display for CacheDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CACHE POLICY: {}", self.policy)?;
        writeln!(f, "CACHE GET HITS: {}", self.stats.get_hits)?;
        writeln!(f, "CACHE PUT HITS: {}", self.stats.put_hits)?;
        writeln!(f, "CACHE MISSES: {}", self.stats.misses)?;
        writeln!(f, "CACHE EVICTIONS: {}", self.stats.evictions)?;
        writeln!(f, "CACHE READS: {}", self.stats.reads)?;
        writeln!(f, "CACHE WRITES: {}", self.stats.writes)?;
        writeln!(
            f,
            "CACHE SIZE: {} / {}",
            self.stats.cache_size_bytes, self.stats.capacity_bytes
        )?;
        for desc in &self.entries {
            writeln!(
                f,
                "Object: {} {} {} {} {} {}",
                desc.block_id,
                desc.last_access,
                desc.get_hits,
                desc.put_hits,
                desc.num_accesses,
                desc.size
            )?;
        }
        Ok(())
    }
}
