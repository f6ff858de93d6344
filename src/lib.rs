//! lofty-books: Lofty marketplace order book harvester and aggregator.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod engine;
pub mod storage;
pub mod types;
