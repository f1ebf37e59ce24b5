//! # Saga Server
//!
//! Wires the account service together: one distributed tier, one local
//! tier, the cache proxies over the MySQL store, and the cleaner that keeps
//! this replica's local tier in step with writes made elsewhere.

pub mod app;

pub use app::*;
