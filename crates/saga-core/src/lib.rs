//! # Saga Core
//!
//! Core types and error definitions for the Saga account service.
//! Every other crate in the workspace speaks in terms of the errors,
//! identifiers and customer records defined here.

pub mod domain;
pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;
pub mod validation;

pub use domain::*;
pub use error::*;
pub use id::*;
pub use result::*;
pub use validation::*;
