//! Cached access to authentication lookups.
//!
//! Unlike profile data, these lookups cache negative results: an unknown
//! id or email is stored as `exist == false` so repeated probes for
//! accounts that do not exist stay off the store.

use super::tiers::CacheTiers;
use crate::cache_keys;
use async_trait::async_trait;
use saga_core::{AccountResult, Customer, CustomerCheck, CustomerCredentials, CustomerId};
use saga_repository::JwtAuthRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Credential lookup as stored in the cache, including misses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachedCredentials {
    pub exist: bool,
    pub id: u64,
    pub active: bool,
    pub bcrypted_password: String,
}

impl From<Option<CustomerCredentials>> for CachedCredentials {
    fn from(credentials: Option<CustomerCredentials>) -> Self {
        match credentials {
            Some(c) => Self {
                exist: true,
                id: c.customer_id.into_inner(),
                active: c.active,
                bcrypted_password: c.bcrypted_password,
            },
            None => Self::default(),
        }
    }
}

impl From<CachedCredentials> for Option<CustomerCredentials> {
    fn from(cached: CachedCredentials) -> Self {
        cached.exist.then(|| CustomerCredentials {
            customer_id: CustomerId(cached.id),
            active: cached.active,
            bcrypted_password: cached.bcrypted_password,
        })
    }
}

/// Auth lookups through both cache tiers.
#[async_trait]
pub trait JwtAuthRepoCache: Send + Sync {
    /// Existence and activation state of a customer. Cached either way.
    async fn check_customer(&self, id: CustomerId) -> AccountResult<CustomerCheck>;

    /// Creates a customer, then drops any cached miss for its id and email.
    async fn create_customer(&self, customer: &Customer) -> AccountResult<()>;

    /// Login credentials by email. Cached either way.
    async fn get_customer_credentials(&self, email: &str) -> AccountResult<Option<CustomerCredentials>>;
}

/// [`JwtAuthRepoCache`] over a [`JwtAuthRepository`].
pub struct JwtAuthRepoCacheImpl {
    repo: Arc<dyn JwtAuthRepository>,
    tiers: CacheTiers,
}

impl JwtAuthRepoCacheImpl {
    pub fn new(repo: Arc<dyn JwtAuthRepository>, tiers: CacheTiers) -> Self {
        Self { repo, tiers }
    }
}

#[async_trait]
impl JwtAuthRepoCache for JwtAuthRepoCacheImpl {
    async fn check_customer(&self, id: CustomerId) -> AccountResult<CustomerCheck> {
        let key = cache_keys::customer_check(id);

        self.tiers
            .get_or_load(&key, || async { self.repo.check_customer(id).await })
            .await
    }

    async fn create_customer(&self, customer: &Customer) -> AccountResult<()> {
        debug!("Creating customer {}", customer.id);

        self.repo.create_customer(customer).await?;
        info!("Customer created: {}", customer.id);

        self.tiers
            .invalidate(vec![
                cache_keys::customer_check(customer.id),
                cache_keys::customer_credentials(customer.email()),
            ])
            .await
    }

    async fn get_customer_credentials(&self, email: &str) -> AccountResult<Option<CustomerCredentials>> {
        let key = cache_keys::customer_credentials(email);

        let cached: CachedCredentials = self
            .tiers
            .get_or_load(&key, || async {
                self.repo.get_customer_credentials(email).await.map(CachedCredentials::from)
            })
            .await?;

        Ok(cached.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_credentials_conversions() {
        let credentials = CustomerCredentials {
            customer_id: CustomerId(1),
            active: true,
            bcrypted_password: "hash".to_string(),
        };

        let cached = CachedCredentials::from(Some(credentials.clone()));
        assert!(cached.exist);
        assert_eq!(cached.id, 1);
        assert_eq!(Option::<CustomerCredentials>::from(cached), Some(credentials));

        let missing = CachedCredentials::from(None);
        assert!(!missing.exist);
        assert_eq!(Option::<CustomerCredentials>::from(missing), None);
    }

    #[test]
    fn test_cached_credentials_wire_shape() {
        let json = serde_json::to_value(CachedCredentials::from(None)).unwrap();
        assert_eq!(json["exist"], false);
        assert_eq!(json["bcrypted_password"], "");
    }
}
