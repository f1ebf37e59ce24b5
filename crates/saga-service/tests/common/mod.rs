//! Shared fixtures for the proxy integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use saga_cache::{
    CacheError, CacheResult, CleanerState, DistributedCache, DistributedMutex, InMemoryDistributedCache, LocalCache,
    LocalCacheCleaner, MessageStream, MutexOptions, PipelineOp, TtlPolicy,
};
use saga_config::CleanerConfig;
use saga_core::{AccountError, AccountResult, Customer, CustomerCheck, CustomerCredentials, CustomerId};
use saga_core::{CustomerPersonalInfo, CustomerShippingInfo};
use saga_repository::{CustomerRepository, JwtAuthRepository};
use saga_service::{CacheTiers, CustomerRepoCacheImpl, JwtAuthRepoCacheImpl};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const TOPIC: &str = "saga:account:invalidation";

pub fn personal_info() -> CustomerPersonalInfo {
    CustomerPersonalInfo {
        first_name: "ming".to_string(),
        last_name: "hsu".to_string(),
        email: "test@ming.com".to_string(),
    }
}

pub fn shipping_info() -> CustomerShippingInfo {
    CustomerShippingInfo {
        address: "Taipei, Taiwan".to_string(),
        phone_number: "+886923456978".to_string(),
    }
}

pub fn test_customer() -> Customer {
    Customer::new(CustomerId(1), personal_info(), shipping_info(), "$2a$10$hash".to_string())
}

/// Mutex schedule fast enough for tests with many contenders.
pub fn fast_mutex() -> MutexOptions {
    MutexOptions {
        lease: Duration::from_secs(5),
        tries: 500,
        min_retry_delay: Duration::from_millis(2),
        max_retry_delay: Duration::from_millis(10),
    }
}

pub fn distributed_cache() -> InMemoryDistributedCache {
    InMemoryDistributedCache::new(TtlPolicy::new(Duration::from_secs(60), Duration::from_secs(10)), fast_mutex())
}

pub async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// In-memory backing store that counts every read.
#[derive(Default)]
pub struct CountingStore {
    customers: Mutex<HashMap<CustomerId, Customer>>,
    load_delay: Duration,
    fail_writes: AtomicBool,
    pub personal_reads: AtomicUsize,
    pub shipping_reads: AtomicUsize,
    pub check_reads: AtomicUsize,
    pub credential_reads: AtomicUsize,
}

impl CountingStore {
    pub fn with_customers(customers: Vec<Customer>) -> Self {
        let store = Self::default();
        {
            let mut map = store.customers.lock().unwrap();
            for customer in customers {
                map.insert(customer.id, customer);
            }
        }
        store
    }

    /// Every read sleeps this long first, widening the miss window.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn read<T>(&self, counter: &AtomicUsize, f: impl FnOnce(&HashMap<CustomerId, Customer>) -> T) -> T {
        counter.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        f(&self.customers.lock().unwrap())
    }

    fn write(&self, id: CustomerId, f: impl FnOnce(&mut Customer)) -> AccountResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AccountError::Database("connection reset".to_string()));
        }
        if let Some(customer) = self.customers.lock().unwrap().get_mut(&id) {
            f(customer);
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for CountingStore {
    async fn get_customer_personal_info(&self, id: CustomerId) -> AccountResult<Option<CustomerPersonalInfo>> {
        Ok(self
            .read(&self.personal_reads, |m| m.get(&id).map(|c| c.personal_info.clone()))
            .await)
    }

    async fn get_customer_shipping_info(&self, id: CustomerId) -> AccountResult<Option<CustomerShippingInfo>> {
        Ok(self
            .read(&self.shipping_reads, |m| m.get(&id).map(|c| c.shipping_info.clone()))
            .await)
    }

    async fn update_customer_personal_info(&self, id: CustomerId, info: &CustomerPersonalInfo) -> AccountResult<()> {
        self.write(id, |c| c.personal_info = info.clone())
    }

    async fn update_customer_shipping_info(&self, id: CustomerId, info: &CustomerShippingInfo) -> AccountResult<()> {
        self.write(id, |c| c.shipping_info = info.clone())
    }

    async fn update_customer_info(
        &self,
        id: CustomerId,
        personal: &CustomerPersonalInfo,
        shipping: &CustomerShippingInfo,
    ) -> AccountResult<()> {
        self.write(id, |c| {
            c.personal_info = personal.clone();
            c.shipping_info = shipping.clone();
        })
    }
}

#[async_trait]
impl JwtAuthRepository for CountingStore {
    async fn check_customer(&self, id: CustomerId) -> AccountResult<CustomerCheck> {
        Ok(self
            .read(&self.check_reads, |m| {
                m.get(&id).map_or_else(CustomerCheck::missing, |c| CustomerCheck::found(c.active))
            })
            .await)
    }

    async fn create_customer(&self, customer: &Customer) -> AccountResult<()> {
        let mut customers = self.customers.lock().unwrap();
        let duplicate = customers.contains_key(&customer.id)
            || customers.values().any(|c| c.email() == customer.email());
        if duplicate {
            return Err(AccountError::conflict("Duplicate entry"));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer_credentials(&self, email: &str) -> AccountResult<Option<CustomerCredentials>> {
        Ok(self
            .read(&self.credential_reads, |m| {
                m.values().find(|c| c.email() == email).map(|c| CustomerCredentials {
                    customer_id: c.id,
                    active: c.active,
                    bcrypted_password: c.password.clone(),
                })
            })
            .await)
    }
}

/// Distributed tier that can be told to fail individual operations.
#[derive(Clone)]
pub struct FlakyCache {
    inner: InMemoryDistributedCache,
    fail_delete: Arc<AtomicBool>,
    fail_pipeline: Arc<AtomicBool>,
    fail_publish: Arc<AtomicBool>,
}

impl FlakyCache {
    pub fn new(inner: InMemoryDistributedCache) -> Self {
        Self {
            inner,
            fail_delete: Arc::default(),
            fail_pipeline: Arc::default(),
            fail_publish: Arc::default(),
        }
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pipeline(&self, fail: bool) {
        self.fail_pipeline.store(fail, Ordering::SeqCst);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    fn injected(op: &'static str, key: &str) -> CacheError {
        CacheError::Pipeline {
            op,
            key: key.to_string(),
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl DistributedCache for FlakyCache {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: String) -> CacheResult<()> {
        self.inner.set_raw(key, value).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::injected("DEL", key));
        }
        self.inner.delete(key).await
    }

    async fn exec_pipeline(&self, ops: Vec<PipelineOp>) -> CacheResult<()> {
        if self.fail_pipeline.load(Ordering::SeqCst) {
            let key = ops.first().map(|op| op.key().to_string()).unwrap_or_default();
            return Err(Self::injected("DEL", &key));
        }
        self.inner.exec_pipeline(ops).await
    }

    fn mutex(&self, name: &str) -> Box<dyn DistributedMutex> {
        self.inner.mutex(name)
    }

    async fn publish_raw(&self, topic: &str, payload: String) -> CacheResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(CacheError::Closed("publisher"));
        }
        self.inner.publish_raw(topic, payload).await
    }

    async fn subscribe(&self, topic: &str) -> CacheResult<MessageStream> {
        self.inner.subscribe(topic).await
    }
}

/// One service process: its own local tier and cleaner, sharing the
/// distributed tier and store with every other replica.
pub struct Replica {
    pub local: LocalCache,
    pub customers: Arc<CustomerRepoCacheImpl>,
    pub auth: Arc<JwtAuthRepoCacheImpl>,
    pub cleaner: Arc<LocalCacheCleaner>,
    handle: JoinHandle<CacheResult<()>>,
}

impl Replica {
    pub async fn start(distributed: Arc<dyn DistributedCache>, store: Arc<CountingStore>) -> Self {
        let local = LocalCache::new(10_000, Duration::from_secs(60));
        let tiers = CacheTiers::new(local.clone(), Arc::clone(&distributed), TOPIC);

        let cleaner_config = CleanerConfig {
            workers: 2,
            queue_capacity: 64,
            ..CleanerConfig::default()
        };
        let cleaner = Arc::new(LocalCacheCleaner::new(distributed, local.clone(), &cleaner_config, TOPIC));
        let handle = {
            let cleaner = Arc::clone(&cleaner);
            tokio::spawn(async move { cleaner.subscribe_invalidation_events().await })
        };
        wait_until(|| cleaner.state() == CleanerState::Running).await;

        Self {
            local,
            customers: Arc::new(CustomerRepoCacheImpl::new(store.clone(), tiers.clone())),
            auth: Arc::new(JwtAuthRepoCacheImpl::new(store, tiers)),
            cleaner,
            handle,
        }
    }

    pub async fn shutdown(self) {
        self.cleaner.close().await;
        self.handle.await.expect("cleaner task panicked").expect("cleaner failed");
    }
}
