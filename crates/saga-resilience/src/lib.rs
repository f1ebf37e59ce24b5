//! # Saga Resilience
//!
//! Bounded retry with a randomized pause between attempts, used wherever a
//! cheap idempotent operation may transiently fail.

pub mod retry;

pub use retry::*;
