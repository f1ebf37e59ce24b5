//! Customer records exchanged between the store, the cache proxies and
//! the service layer.

pub mod auth;
pub mod customer;

pub use auth::*;
pub use customer::*;
