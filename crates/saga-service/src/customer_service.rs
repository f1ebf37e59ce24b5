//! Customer profile service.

use crate::proxy::CustomerRepoCache;
use async_trait::async_trait;
use saga_core::{AccountError, AccountResult, CustomerId, CustomerPersonalInfo, CustomerShippingInfo, ValidateExt};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Customer profile operations exposed to the transport layers.
#[async_trait]
pub trait CustomerService: Send + Sync {
    /// Gets a customer's personal info.
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<CustomerPersonalInfo>;

    /// Gets a customer's shipping info.
    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<CustomerShippingInfo>;

    /// Replaces a customer's personal info.
    async fn update_customer_personal_info(&self, id: CustomerId, info: CustomerPersonalInfo) -> AccountResult<()>;

    /// Replaces a customer's shipping info.
    async fn update_customer_shipping_info(&self, id: CustomerId, info: CustomerShippingInfo) -> AccountResult<()>;

    /// Replaces both in one write.
    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: CustomerPersonalInfo,
        shipping: CustomerShippingInfo,
    ) -> AccountResult<()>;
}

/// Customer service implementation.
pub struct CustomerServiceImpl {
    customer_repo: Arc<dyn CustomerRepoCache>,
}

impl CustomerServiceImpl {
    /// Creates a new customer service.
    pub fn new(customer_repo: Arc<dyn CustomerRepoCache>) -> Self {
        Self { customer_repo }
    }
}

/// Logs failures that are not an expected "no such customer".
fn log_failure<T>(operation: &'static str, id: CustomerId, result: AccountResult<T>) -> AccountResult<T> {
    if let Err(e) = &result {
        match e {
            AccountError::NotFound { .. } => {}
            AccountError::InvalidationFailed { .. } => {
                error!(customer_id = %id, operation, error = %e, "Write committed but cache invalidation failed");
            }
            _ => error!(customer_id = %id, operation, error = %e, "Customer operation failed"),
        }
    }
    result
}

#[async_trait]
impl CustomerService for CustomerServiceImpl {
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<CustomerPersonalInfo> {
        debug!("Getting personal info of customer {}", id);

        let result = self.customer_repo.get_customer_personal_info(id).await;
        log_failure("get_customer_personal_info", id, result)
    }

    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<CustomerShippingInfo> {
        debug!("Getting shipping info of customer {}", id);

        let result = self.customer_repo.get_customer_shipping_info(id).await;
        log_failure("get_customer_shipping_info", id, result)
    }

    async fn update_customer_personal_info(&self, id: CustomerId, info: CustomerPersonalInfo) -> AccountResult<()> {
        info.validate_input()?;

        let result = self.customer_repo.update_customer_personal_info(id, &info).await;
        if result.is_ok() {
            info!("Personal info updated: {}", id);
        }
        log_failure("update_customer_personal_info", id, result)
    }

    async fn update_customer_shipping_info(&self, id: CustomerId, info: CustomerShippingInfo) -> AccountResult<()> {
        info.validate_input()?;

        let result = self.customer_repo.update_customer_shipping_info(id, &info).await;
        if result.is_ok() {
            info!("Shipping info updated: {}", id);
        }
        log_failure("update_customer_shipping_info", id, result)
    }

    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: CustomerPersonalInfo,
        shipping: CustomerShippingInfo,
    ) -> AccountResult<()> {
        personal.validate_input()?;
        shipping.validate_input()?;

        let result = self.customer_repo.update_customer_info(id, &personal, &shipping).await;
        if result.is_ok() {
            info!("Customer info updated: {}", id);
        }
        log_failure("update_customer_info", id, result)
    }
}
