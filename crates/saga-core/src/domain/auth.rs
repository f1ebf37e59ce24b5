//! Records backing the authentication flow.

use crate::CustomerId;
use serde::{Deserialize, Serialize};

/// Result of an existence/activation check for a customer id.
///
/// A missing customer is a normal outcome here, not an error: `exist`
/// is simply false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerCheck {
    pub exist: bool,
    pub active: bool,
}

impl CustomerCheck {
    /// Check result for an existing customer.
    #[must_use]
    pub const fn found(active: bool) -> Self {
        Self { exist: true, active }
    }

    /// Check result for an unknown customer.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            exist: false,
            active: false,
        }
    }
}

/// Login material looked up by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCredentials {
    pub customer_id: CustomerId,
    pub active: bool,
    pub bcrypted_password: String,
}
