//! Per-block metadata records.
//!
//! A descriptor holds what the cache knows about one block: its size, its
//! etag and how often it has been touched. Block payloads are never stored.

use serde::Serialize;

/// Opaque, caller-assigned block identifier.
pub type BlockId = String;

/// Metadata for a single cached block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// Unique key of the block.
    pub block_id: BlockId,

    /// Size of the block in bytes.
    pub size: u64,

    /// Opaque content version tag (may be empty).
    pub etag: String,

    /// Logical clock value of the most recent creation or hit.
    pub last_access: u64,

    /// Number of GET hits.
    pub get_hits: u64,

    /// Number of PUT hits (updates of an existing entry).
    pub put_hits: u64,

    /// Total hits of either kind. Always `get_hits + put_hits`.
    pub num_accesses: u64,
}

impl Descriptor {
    /// Create a descriptor for a block admitted at logical time `now`.
    pub fn new(block_id: impl Into<BlockId>, size: u64, etag: impl Into<String>, now: u64) -> Self {
        Self {
            block_id: block_id.into(),
            size,
            etag: etag.into(),
            last_access: now,
            get_hits: 0,
            put_hits: 0,
            num_accesses: 0,
        }
    }

    /// Record a GET hit.
    pub fn get_hit(&mut self, now: u64) {
        self.get_hits += 1;
        self.touch(now);
    }

    /// Record a PUT hit.
    pub fn put_hit(&mut self, now: u64) {
        self.put_hits += 1;
        self.touch(now);
    }

    fn touch(&mut self, now: u64) {
        self.last_access = now;
        self.num_accesses += 1;
    }
}
