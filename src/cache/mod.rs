//! Block metadata cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`descriptor`]: per-block metadata records
//! - [`policy`]: eviction ordering (LRU / LFU)
//! - [`engine`]: the locked engine that admits, looks up and evicts blocks

pub mod descriptor;
pub mod engine;
pub mod policy;

pub use descriptor::{BlockId, Descriptor};
pub use engine::{new_shared_cache, AccessResult, BlockCache, CacheOp, Lookup, SharedCache};
pub use policy::EvictionPolicy;
