//! Result type aliases for the account service.

use crate::AccountError;

/// A specialized `Result` type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;
