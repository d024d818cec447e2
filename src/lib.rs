//! block-meta-cache: size-bounded metadata cache for storage blocks.
//!
//! Tracks which blocks are hot without holding their payloads: only size,
//! etag and access statistics. A storage layer asks two questions:
//!   GET: is this block cached, and what is its size/etag?
//!   PUT: register this block, evicting older entries if over budget.
//!
//! The engine itself performs no I/O. The binary wraps it in an HTTP API.

pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod stats;
