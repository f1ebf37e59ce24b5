//! MySQL repository implementations.

mod customer_repository;

pub use customer_repository::*;
