//! Customer profile records.

use crate::CustomerId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Name and contact email of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerPersonalInfo {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50))]
    pub last_name: String,

    #[validate(email, length(max = 320))]
    pub email: String,
}

/// Where orders for a customer are shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerShippingInfo {
    #[validate(length(min = 1))]
    pub address: String,

    #[validate(length(min = 1, max = 20))]
    pub phone_number: String,
}

/// A customer account as persisted by the store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Customer {
    pub id: CustomerId,

    pub active: bool,

    #[validate(nested)]
    pub personal_info: CustomerPersonalInfo,

    #[validate(nested)]
    pub shipping_info: CustomerShippingInfo,

    /// Bcrypt hash of the account password (never the plaintext).
    #[serde(skip_serializing)]
    pub password: String,
}

impl Customer {
    /// Creates an active customer.
    #[must_use]
    pub fn new(
        id: CustomerId,
        personal_info: CustomerPersonalInfo,
        shipping_info: CustomerShippingInfo,
        password: String,
    ) -> Self {
        Self {
            id,
            active: true,
            personal_info,
            shipping_info,
            password,
        }
    }

    /// Returns the login email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.personal_info.email
    }
}
