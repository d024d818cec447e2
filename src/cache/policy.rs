//! Eviction policy: decides which descriptors are evicted first.
//!
//! The engine keeps its descriptor sequence sorted most-preferred first, so
//! the victim is always the last element:
//! - LRU: descending by `last_access` (oldest access at the tail)
//! - LFU: descending by `get_hits` (fewest reads at the tail; PUT hits ignored)

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::descriptor::{BlockId, Descriptor};
use crate::error::CacheError;

/// The closed set of supported eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvictionPolicy {
    /// Least-recently-used.
    Lru,
    /// Least-frequently-used, counting GET hits only.
    #[default]
    Lfu,
}

impl EvictionPolicy {
    /// Sort key for a descriptor. Larger keys are kept longer.
    pub fn retention_key(&self, desc: &Descriptor) -> u64 {
        match self {
            EvictionPolicy::Lru => desc.last_access,
            EvictionPolicy::Lfu => desc.get_hits,
        }
    }

    /// Re-order block ids most-preferred first, looking keys up in `entries`.
    ///
    /// The sort is stable, so entries with equal keys keep their relative order.
    pub fn sort(&self, order: &mut [BlockId], entries: &HashMap<BlockId, Descriptor>) {
        order.sort_by_key(|id| Reverse(entries.get(id).map_or(0, |d| self.retention_key(d))));
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "LRU",
            EvictionPolicy::Lfu => "LFU",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionPolicy::Lru),
            "LFU" => Ok(EvictionPolicy::Lfu),
            _ => Err(CacheError::UnsupportedPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for EvictionPolicy {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvictionPolicy> for String {
    fn from(policy: EvictionPolicy) -> Self {
        policy.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_desc(id: &str, last_access: u64, get_hits: u64, put_hits: u64) -> Descriptor {
        let mut desc = Descriptor::new(id, 10, "", last_access);
        desc.get_hits = get_hits;
        desc.put_hits = put_hits;
        desc.num_accesses = get_hits + put_hits;
        desc
    }

    fn sorted(policy: EvictionPolicy, descs: Vec<Descriptor>) -> Vec<BlockId> {
        let mut order: Vec<BlockId> = descs.iter().map(|d| d.block_id.clone()).collect();
        let entries: HashMap<BlockId, Descriptor> =
            descs.into_iter().map(|d| (d.block_id.clone(), d)).collect();
        policy.sort(&mut order, &entries);
        order
    }

    #[test]
    fn test_lru_puts_oldest_last() {
        let order = sorted(
            EvictionPolicy::Lru,
            vec![
                make_desc("old", 1, 50, 0),
                make_desc("new", 9, 0, 0),
                make_desc("mid", 5, 3, 0),
            ],
        );
        assert_eq!(order, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_lfu_ignores_put_hits() {
        let order = sorted(
            EvictionPolicy::Lfu,
            vec![make_desc("written", 1, 1, 100), make_desc("read", 2, 5, 0)],
        );
        assert_eq!(order, vec!["read", "written"]);
    }

    #[test]
    fn test_lfu_ties_keep_order() {
        let order = sorted(
            EvictionPolicy::Lfu,
            vec![make_desc("a", 3, 2, 0), make_desc("b", 1, 2, 0)],
        );
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!("lfu".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lfu);
        assert_eq!(
            "ARC".parse::<EvictionPolicy>().unwrap_err(),
            CacheError::UnsupportedPolicy("ARC".to_string())
        );
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&EvictionPolicy::Lru).unwrap();
        assert_eq!(json, "\"LRU\"");
        let policy: EvictionPolicy = serde_json::from_str("\"LFU\"").unwrap();
        assert_eq!(policy, EvictionPolicy::Lfu);
        assert!(serde_json::from_str::<EvictionPolicy>("\"MRU\"").is_err());
    }
}
