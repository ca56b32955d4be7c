//! PADDOCK: racing odds monitor.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod feed;
pub mod normalize;
pub mod analytics;
pub mod engine;
pub mod export;
pub mod storage;
pub mod dashboard;
