//! HTTP server: admission API, statistics and diagnostics endpoints.

pub mod api;
