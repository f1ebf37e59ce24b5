//! Repository trait definitions.

use async_trait::async_trait;
use saga_core::{AccountResult, Customer, CustomerCheck, CustomerCredentials, CustomerId};
use saga_core::{CustomerPersonalInfo, CustomerShippingInfo};

/// Profile data of a customer.
///
/// Reads return `Ok(None)` when the customer does not exist.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Finds the name and email of a customer.
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<Option<CustomerPersonalInfo>>;

    /// Finds the shipping address and phone number of a customer.
    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<Option<CustomerShippingInfo>>;

    /// Replaces the personal info of a customer.
    async fn update_customer_personal_info(&self, id: CustomerId, info: &CustomerPersonalInfo) -> AccountResult<()>;

    /// Replaces the shipping info of a customer.
    async fn update_customer_shipping_info(&self, id: CustomerId, info: &CustomerShippingInfo) -> AccountResult<()>;

    /// Replaces personal and shipping info in one statement.
    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: &CustomerPersonalInfo,
        shipping: &CustomerShippingInfo,
    ) -> AccountResult<()>;
}

/// Account lookups used by authentication.
#[async_trait]
pub trait JwtAuthRepository: Send + Sync {
    /// Reports whether the customer exists and is active. A missing customer
    /// is `exist == false`, not an error.
    async fn check_customer(&self, id: CustomerId) -> AccountResult<CustomerCheck>;

    /// Inserts a new customer. Duplicate id, email or phone number fails
    /// with `AccountError::Conflict`.
    async fn create_customer(&self, customer: &Customer) -> AccountResult<()>;

    /// Finds login credentials by email.
    async fn get_customer_credentials(&self, email: &str) -> AccountResult<Option<CustomerCredentials>>;
}
