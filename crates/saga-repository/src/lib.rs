//! # Saga Repository
//!
//! Backing store of the account service. The cache proxies in
//! `saga-service` sit in front of these traits; nothing here knows about
//! caching.
//!
//! ```text
//! CustomerRepoCache / JwtAuthRepoCache
//!   ↓  Arc<dyn CustomerRepository> / Arc<dyn JwtAuthRepository>
//! MySqlCustomerRepository
//!   ↓  Arc<dyn DatabasePoolInterface>
//! MySQL
//! ```

pub mod mysql;
pub mod pool;
pub mod traits;

pub use mysql::*;
pub use pool::*;
pub use traits::*;
