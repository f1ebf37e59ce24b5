//! Integration tests for MySqlCustomerRepository.
//!
//! These tests run against a real MySQL database using testcontainers.
//! Requires Docker; run with `--ignored`.

mod common;

use common::{test_customer, TestDatabase};
use saga_core::{AccountError, CustomerCheck, CustomerId, CustomerPersonalInfo, CustomerShippingInfo};
use saga_repository::{CustomerRepository, JwtAuthRepository, MySqlCustomerRepository};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_and_read_back() {
    let db = TestDatabase::new().await;
    let repo = MySqlCustomerRepository::new(db.pool());

    let customer = test_customer(1, "test@ming.com", "+886923456978");
    repo.create_customer(&customer).await.expect("Failed to create customer");

    let personal = repo
        .get_customer_personal_info(CustomerId(1))
        .await
        .expect("Query failed")
        .expect("Customer not found");
    assert_eq!(personal, customer.personal_info);

    let shipping = repo
        .get_customer_shipping_info(CustomerId(1))
        .await
        .expect("Query failed")
        .expect("Customer not found");
    assert_eq!(shipping, customer.shipping_info);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_customer_reads_none() {
    let db = TestDatabase::new().await;
    let repo = MySqlCustomerRepository::new(db.pool());

    assert!(repo.get_customer_personal_info(CustomerId(999)).await.unwrap().is_none());
    assert!(repo.get_customer_shipping_info(CustomerId(999)).await.unwrap().is_none());
    assert!(repo.get_customer_credentials("nonexist@ming.com").await.unwrap().is_none());
    assert_eq!(repo.check_customer(CustomerId(999)).await.unwrap(), CustomerCheck::missing());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_duplicate_email_is_conflict() {
    let db = TestDatabase::new().await;
    let repo = MySqlCustomerRepository::new(db.pool());

    repo.create_customer(&test_customer(1, "test@ming.com", "+886923456978"))
        .await
        .unwrap();
    let err = repo
        .create_customer(&test_customer(2, "test@ming.com", "+886900000000"))
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_check_customer_and_credentials() {
    let db = TestDatabase::new().await;
    let repo = MySqlCustomerRepository::new(db.pool());

    let customer = test_customer(1, "test@ming.com", "+886923456978");
    repo.create_customer(&customer).await.unwrap();

    assert_eq!(repo.check_customer(CustomerId(1)).await.unwrap(), CustomerCheck::found(true));

    let credentials = repo
        .get_customer_credentials("test@ming.com")
        .await
        .unwrap()
        .expect("credentials not found");
    assert_eq!(credentials.customer_id, CustomerId(1));
    assert!(credentials.active);
    assert_eq!(credentials.bcrypted_password, customer.password);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_customer_info() {
    let db = TestDatabase::new().await;
    let repo = MySqlCustomerRepository::new(db.pool());
    repo.create_customer(&test_customer(1, "test@ming.com", "+886923456978"))
        .await
        .unwrap();

    let personal = CustomerPersonalInfo {
        first_name: "newfirst".to_string(),
        last_name: "newlast".to_string(),
        email: "newemail@ming.com".to_string(),
    };
    let shipping = CustomerShippingInfo {
        address: "Kaohsiung, Taiwan".to_string(),
        phone_number: "+886912345678".to_string(),
    };
    repo.update_customer_info(CustomerId(1), &personal, &shipping).await.unwrap();

    assert_eq!(repo.get_customer_personal_info(CustomerId(1)).await.unwrap(), Some(personal));
    assert_eq!(repo.get_customer_shipping_info(CustomerId(1)).await.unwrap(), Some(shipping.clone()));

    let moved = CustomerShippingInfo {
        address: "Tainan, Taiwan".to_string(),
        ..shipping
    };
    repo.update_customer_shipping_info(CustomerId(1), &moved).await.unwrap();
    assert_eq!(repo.get_customer_shipping_info(CustomerId(1)).await.unwrap(), Some(moved));
}
