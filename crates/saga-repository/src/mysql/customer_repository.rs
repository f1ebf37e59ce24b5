//! MySQL customer repository implementation.

use crate::pool::DatabasePoolInterface;
use crate::traits::{CustomerRepository, JwtAuthRepository};
use async_trait::async_trait;
use saga_core::{AccountResult, Customer, CustomerCheck, CustomerCredentials, CustomerId};
use saga_core::{CustomerPersonalInfo, CustomerShippingInfo};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::debug;

/// Customer store over the `customers` table.
///
/// Implements both repository traits; profile and auth lookups read
/// different column sets of the same row.
#[derive(Clone)]
pub struct MySqlCustomerRepository {
    pool: Arc<dyn DatabasePoolInterface>,
}

impl MySqlCustomerRepository {
    /// Creates a new MySQL customer repository.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PersonalInfoRow {
    first_name: String,
    last_name: String,
    email: String,
}

impl From<PersonalInfoRow> for CustomerPersonalInfo {
    fn from(row: PersonalInfoRow) -> Self {
        Self {
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
        }
    }
}

#[derive(Debug, FromRow)]
struct ShippingInfoRow {
    address: String,
    phone_number: String,
}

impl From<ShippingInfoRow> for CustomerShippingInfo {
    fn from(row: ShippingInfoRow) -> Self {
        Self {
            address: row.address,
            phone_number: row.phone_number,
        }
    }
}

#[derive(Debug, FromRow)]
struct CredentialsRow {
    id: u64,
    active: bool,
    password: String,
}

impl From<CredentialsRow> for CustomerCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            customer_id: CustomerId(row.id),
            active: row.active,
            bcrypted_password: row.password,
        }
    }
}

#[async_trait]
impl CustomerRepository for MySqlCustomerRepository {
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<Option<CustomerPersonalInfo>> {
        debug!("Finding personal info of customer {}", id);

        let row = sqlx::query_as::<_, PersonalInfoRow>(
            "SELECT first_name, last_name, email FROM customers WHERE id = ?",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<Option<CustomerShippingInfo>> {
        debug!("Finding shipping info of customer {}", id);

        let row = sqlx::query_as::<_, ShippingInfoRow>(
            "SELECT address, phone_number FROM customers WHERE id = ?",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_customer_personal_info(&self, id: CustomerId, info: &CustomerPersonalInfo) -> AccountResult<()> {
        debug!("Updating personal info of customer {}", id);

        sqlx::query(
            r#"
            UPDATE customers
            SET first_name = ?, last_name = ?, email = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&info.first_name)
        .bind(&info.last_name)
        .bind(&info.email)
        .bind(id.into_inner())
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn update_customer_shipping_info(&self, id: CustomerId, info: &CustomerShippingInfo) -> AccountResult<()> {
        debug!("Updating shipping info of customer {}", id);

        sqlx::query(
            r#"
            UPDATE customers
            SET address = ?, phone_number = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&info.address)
        .bind(&info.phone_number)
        .bind(id.into_inner())
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: &CustomerPersonalInfo,
        shipping: &CustomerShippingInfo,
    ) -> AccountResult<()> {
        debug!("Updating personal and shipping info of customer {}", id);

        sqlx::query(
            r#"
            UPDATE customers
            SET first_name = ?, last_name = ?, email = ?,
                address = ?, phone_number = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&personal.first_name)
        .bind(&personal.last_name)
        .bind(&personal.email)
        .bind(&shipping.address)
        .bind(&shipping.phone_number)
        .bind(id.into_inner())
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JwtAuthRepository for MySqlCustomerRepository {
    async fn check_customer(&self, id: CustomerId) -> AccountResult<CustomerCheck> {
        debug!("Checking customer {}", id);

        let active: Option<bool> = sqlx::query_scalar("SELECT active FROM customers WHERE id = ?")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;

        Ok(active.map_or_else(CustomerCheck::missing, CustomerCheck::found))
    }

    async fn create_customer(&self, customer: &Customer) -> AccountResult<()> {
        debug!("Creating customer {}", customer.id);

        sqlx::query(
            r#"
            INSERT INTO customers (id, active, first_name, last_name, email,
                                   address, phone_number, password)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.into_inner())
        .bind(customer.active)
        .bind(&customer.personal_info.first_name)
        .bind(&customer.personal_info.last_name)
        .bind(&customer.personal_info.email)
        .bind(&customer.shipping_info.address)
        .bind(&customer.shipping_info.phone_number)
        .bind(&customer.password)
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn get_customer_credentials(&self, email: &str) -> AccountResult<Option<CustomerCredentials>> {
        debug!("Finding credentials for {}", email);

        let row = sqlx::query_as::<_, CredentialsRow>("SELECT id, active, password FROM customers WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool.inner())
            .await?;

        Ok(row.map(Into::into))
    }
}
