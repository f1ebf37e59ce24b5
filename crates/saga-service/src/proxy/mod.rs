//! Read-through / write-invalidate proxies over the repositories.

mod auth;
mod customer;
mod tiers;

pub use auth::{CachedCredentials, JwtAuthRepoCache, JwtAuthRepoCacheImpl};
pub use customer::{CustomerRepoCache, CustomerRepoCacheImpl};
pub use tiers::CacheTiers;
