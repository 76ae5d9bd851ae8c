//! fio-watch: Fio bank balance watcher
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod money;
pub mod bank;
pub mod items;
pub mod engine;
pub mod storage;
