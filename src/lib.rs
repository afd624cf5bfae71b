//! lcp library
//!
//! Exposes the cache engine, providers, configuration and HTTP surface for the
//! binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod server;
