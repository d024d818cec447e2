//! Error types for the block metadata cache.

use thiserror::Error;

/// Everything the cache engine can fail with.
///
/// None of these are transient: each one is either a caller contract
/// violation or a bug in the engine, and is surfaced immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unsupported cache operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported caching policy: {0}")]
    UnsupportedPolicy(String),

    #[error("Internal consistency fault: {0}")]
    InternalConsistency(String),

    #[error("Block {block_id} of {size} bytes can never fit in a cache of {capacity} bytes")]
    OversizedBlock {
        block_id: String,
        size: u64,
        capacity: u64,
    },
}

impl CacheError {
    /// Whether this error was caused by the caller (as opposed to an engine bug).
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, CacheError::InternalConsistency(_))
    }
}
