//! # Saga Service
//!
//! Cache proxies in front of the backing store, and the customer service
//! built on them.
//!
//! Reads go local tier → distributed tier → (under a per-key distributed
//! mutex) store. Writes go store → distributed delete → invalidation
//! broadcast, which every replica's cleaner turns into a local eviction.

pub mod cache_keys;
pub mod customer_service;
pub mod proxy;

pub use customer_service::*;
pub use proxy::*;
