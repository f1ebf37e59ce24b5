//! Cached access to customer profile data.

use super::tiers::CacheTiers;
use crate::cache_keys;
use async_trait::async_trait;
use saga_core::{AccountError, AccountResult, CustomerId, CustomerPersonalInfo, CustomerShippingInfo};
use saga_repository::CustomerRepository;
use std::sync::Arc;
use tracing::debug;

/// Profile reads and writes through both cache tiers.
///
/// A customer that does not exist is reported as `NotFound` and never
/// cached; only records that exist are stored.
#[async_trait]
pub trait CustomerRepoCache: Send + Sync {
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<CustomerPersonalInfo>;

    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<CustomerShippingInfo>;

    async fn update_customer_personal_info(&self, id: CustomerId, info: &CustomerPersonalInfo) -> AccountResult<()>;

    async fn update_customer_shipping_info(&self, id: CustomerId, info: &CustomerShippingInfo) -> AccountResult<()>;

    /// Updates both groups and invalidates their keys in one batch.
    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: &CustomerPersonalInfo,
        shipping: &CustomerShippingInfo,
    ) -> AccountResult<()>;
}

/// [`CustomerRepoCache`] over a [`CustomerRepository`].
pub struct CustomerRepoCacheImpl {
    repo: Arc<dyn CustomerRepository>,
    tiers: CacheTiers,
}

impl CustomerRepoCacheImpl {
    pub fn new(repo: Arc<dyn CustomerRepository>, tiers: CacheTiers) -> Self {
        Self { repo, tiers }
    }

    /// Keys a personal info write makes stale.
    ///
    /// Credentials are cached by email, so the lookups for both the stored
    /// email and the incoming one go too. Must run before the write.
    async fn personal_info_keys(&self, id: CustomerId, email: &str) -> AccountResult<Vec<String>> {
        let mut keys = vec![cache_keys::personal_info(id), cache_keys::customer_credentials(email)];

        if let Some(current) = self.repo.get_customer_personal_info(id).await? {
            if current.email != email {
                keys.push(cache_keys::customer_credentials(&current.email));
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CustomerRepoCache for CustomerRepoCacheImpl {
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<CustomerPersonalInfo> {
        let key = cache_keys::personal_info(id);

        self.tiers
            .get_or_load(&key, || async {
                self.repo
                    .get_customer_personal_info(id)
                    .await?
                    .ok_or_else(|| AccountError::not_found("CustomerPersonalInfo", id))
            })
            .await
    }

    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<CustomerShippingInfo> {
        let key = cache_keys::shipping_info(id);

        self.tiers
            .get_or_load(&key, || async {
                self.repo
                    .get_customer_shipping_info(id)
                    .await?
                    .ok_or_else(|| AccountError::not_found("CustomerShippingInfo", id))
            })
            .await
    }

    async fn update_customer_personal_info(&self, id: CustomerId, info: &CustomerPersonalInfo) -> AccountResult<()> {
        debug!("Updating personal info of customer {}", id);

        let keys = self.personal_info_keys(id, &info.email).await?;
        self.repo.update_customer_personal_info(id, info).await?;
        self.tiers.invalidate(keys).await
    }

    async fn update_customer_shipping_info(&self, id: CustomerId, info: &CustomerShippingInfo) -> AccountResult<()> {
        debug!("Updating shipping info of customer {}", id);

        self.repo.update_customer_shipping_info(id, info).await?;
        self.tiers.invalidate(vec![cache_keys::shipping_info(id)]).await
    }

    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: &CustomerPersonalInfo,
        shipping: &CustomerShippingInfo,
    ) -> AccountResult<()> {
        debug!("Updating personal and shipping info of customer {}", id);

        let mut keys = self.personal_info_keys(id, &personal.email).await?;
        keys.push(cache_keys::shipping_info(id));

        self.repo.update_customer_info(id, personal, shipping).await?;
        self.tiers.invalidate(keys).await
    }
}
