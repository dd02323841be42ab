//! AUTOSWAP: scheduled two-way DEX swap runner
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod scoring;
pub mod strategy;
pub mod types;
