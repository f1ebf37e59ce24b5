//! Cache key generators for consistent key naming.
//!
//! Each prefix maps to exactly one repository read, so a key alone says
//! how to repopulate it.

use saga_core::CustomerId;

pub const PERSONAL_INFO_PREFIX: &str = "cuspersonalinfo:";
pub const SHIPPING_INFO_PREFIX: &str = "cusshippinginfo:";
pub const CUSTOMER_CHECK_PREFIX: &str = "cuscheck:";
pub const CUSTOMER_CREDENTIALS_PREFIX: &str = "cuscred:";
/// Prefix of the fill mutex guarding a cache key.
pub const MUTEX_PREFIX: &str = "mutex:";

#[must_use]
pub fn personal_info(id: CustomerId) -> String {
    format!("{}{}", PERSONAL_INFO_PREFIX, id)
}

#[must_use]
pub fn shipping_info(id: CustomerId) -> String {
    format!("{}{}", SHIPPING_INFO_PREFIX, id)
}

#[must_use]
pub fn customer_check(id: CustomerId) -> String {
    format!("{}{}", CUSTOMER_CHECK_PREFIX, id)
}

/// Credentials are looked up by login email, so the key carries the email.
#[must_use]
pub fn customer_credentials(email: &str) -> String {
    format!("{}{}", CUSTOMER_CREDENTIALS_PREFIX, email)
}

/// Name of the distributed mutex serializing fills of `key`.
#[must_use]
pub fn mutex(key: &str) -> String {
    format!("{}{}", MUTEX_PREFIX, key)
}
