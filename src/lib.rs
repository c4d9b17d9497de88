//! RENTWATCH: car-rental price watcher
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod fetcher;
pub mod notify;
pub mod storage;
pub mod types;
