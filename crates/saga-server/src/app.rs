//! Application assembly and lifecycle.

use saga_cache::{
    CacheResult, CleanerState, DistributedCache, InMemoryDistributedCache, LocalCache, LocalCacheCleaner, MutexOptions,
    RedisCache, TtlPolicy,
};
use saga_config::{AppConfig, RedisConfig};
use saga_core::{AccountError, AccountResult};
use saga_repository::{create_pool, CustomerRepository, DatabasePoolInterface, JwtAuthRepository, MySqlCustomerRepository};
use saga_service::{
    CacheTiers, CustomerRepoCache, CustomerRepoCacheImpl, CustomerService, CustomerServiceImpl, JwtAuthRepoCache,
    JwtAuthRepoCacheImpl,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Builds the distributed tier selected by `redis.enabled`.
///
/// With Redis disabled the tier lives in this process, so invalidations
/// never reach other replicas.
pub async fn connect_distributed(config: &RedisConfig) -> AccountResult<Arc<dyn DistributedCache>> {
    if config.enabled {
        let cache = RedisCache::connect(config).await?;
        return Ok(Arc::new(cache));
    }

    warn!("Redis disabled, using an in-process distributed tier");
    Ok(Arc::new(InMemoryDistributedCache::new(
        TtlPolicy::from(config),
        MutexOptions::from(config),
    )))
}

/// A fully wired account service replica.
pub struct Application {
    config: AppConfig,
    db_pool: Option<Arc<dyn DatabasePoolInterface>>,
    local: LocalCache,
    distributed: Arc<dyn DistributedCache>,
    customer_cache: Arc<dyn CustomerRepoCache>,
    auth_cache: Arc<dyn JwtAuthRepoCache>,
    customer_service: Arc<dyn CustomerService>,
    cleaner: Arc<LocalCacheCleaner>,
    cleaner_task: Option<JoinHandle<CacheResult<()>>>,
}

impl Application {
    /// Connects to MySQL and the distributed tier, runs migrations and
    /// wires every component.
    pub async fn build(config: AppConfig) -> AccountResult<Self> {
        let db_pool: Arc<dyn DatabasePoolInterface> = create_pool(&config.database).await?;
        db_pool.run_migrations().await?;

        let repo = Arc::new(MySqlCustomerRepository::new(Arc::clone(&db_pool)));
        let distributed = connect_distributed(&config.redis).await?;

        let mut app = Self::from_parts(config, repo.clone(), repo, distributed);
        app.db_pool = Some(db_pool);
        Ok(app)
    }

    /// Wires the components over already constructed backends.
    pub fn from_parts(
        config: AppConfig,
        customers: Arc<dyn CustomerRepository>,
        auth: Arc<dyn JwtAuthRepository>,
        distributed: Arc<dyn DistributedCache>,
    ) -> Self {
        let local = LocalCache::from_config(&config.local_cache);
        let topic = config.redis.invalidation_topic.clone();
        let tiers = CacheTiers::new(local.clone(), Arc::clone(&distributed), topic.clone());

        let customer_cache: Arc<dyn CustomerRepoCache> = Arc::new(CustomerRepoCacheImpl::new(customers, tiers.clone()));
        let auth_cache: Arc<dyn JwtAuthRepoCache> = Arc::new(JwtAuthRepoCacheImpl::new(auth, tiers));
        let customer_service: Arc<dyn CustomerService> = Arc::new(CustomerServiceImpl::new(Arc::clone(&customer_cache)));

        let cleaner = Arc::new(LocalCacheCleaner::new(
            Arc::clone(&distributed),
            local.clone(),
            &config.cleaner,
            topic,
        ));

        Self {
            config,
            db_pool: None,
            local,
            distributed,
            customer_cache,
            auth_cache,
            customer_service,
            cleaner,
            cleaner_task: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn local_cache(&self) -> &LocalCache {
        &self.local
    }

    pub fn distributed(&self) -> &Arc<dyn DistributedCache> {
        &self.distributed
    }

    pub fn customer_cache(&self) -> Arc<dyn CustomerRepoCache> {
        Arc::clone(&self.customer_cache)
    }

    pub fn auth_cache(&self) -> Arc<dyn JwtAuthRepoCache> {
        Arc::clone(&self.auth_cache)
    }

    pub fn customer_service(&self) -> Arc<dyn CustomerService> {
        Arc::clone(&self.customer_service)
    }

    pub fn cleaner_state(&self) -> CleanerState {
        self.cleaner.state()
    }

    /// Starts the invalidation subscriber and returns once it is receiving.
    ///
    /// Fails if the subscription cannot be established. Calling it again
    /// after a successful start does nothing.
    pub async fn start(&mut self) -> AccountResult<()> {
        if self.cleaner_task.is_some() {
            return Ok(());
        }

        let cleaner = Arc::clone(&self.cleaner);
        let mut task = tokio::spawn(async move { cleaner.subscribe_invalidation_events().await });

        let running = async {
            while self.cleaner.state() != CleanerState::Running {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };

        let exited = tokio::select! {
            () = running => None,
            finished = &mut task => Some(finished),
        };
        if let Some(finished) = exited {
            return Err(subscriber_exit(finished));
        }

        info!(topic = %self.cleaner.topic(), "Invalidation subscriber running");
        self.cleaner_task = Some(task);
        Ok(())
    }

    /// Runs until `shutdown` resolves, then shuts down.
    ///
    /// If the invalidation subscriber stops on its own first, the replica
    /// can no longer keep its local tier fresh: it shuts down and reports
    /// an error instead.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> AccountResult<()> {
        self.start().await?;

        let mut outcome = Ok(());
        if let Some(mut task) = self.cleaner_task.take() {
            let exited = tokio::select! {
                () = shutdown => None,
                finished = &mut task => Some(finished),
            };
            match exited {
                None => self.cleaner_task = Some(task),
                Some(finished) => {
                    let e = subscriber_exit(finished);
                    error!(error = %e, "Invalidation subscriber stopped, shutting down");
                    outcome = Err(e);
                }
            }
        }

        self.shutdown().await;
        outcome
    }

    /// Stops the cleaner (and its worker pool), then closes the database pool.
    pub async fn shutdown(mut self) {
        info!("Shutting down...");

        self.cleaner.close().await;
        if let Some(task) = self.cleaner_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Invalidation subscriber ended with error"),
                Err(e) => error!(error = %e, "Invalidation subscriber task failed"),
            }
        }

        if let Some(pool) = self.db_pool.take() {
            pool.close().await;
        }

        info!("Shutdown complete");
    }
}

fn subscriber_exit(finished: Result<CacheResult<()>, JoinError>) -> AccountError {
    match finished {
        Ok(Ok(())) => AccountError::Internal("Invalidation subscriber stopped unexpectedly".to_string()),
        Ok(Err(e)) => e.into(),
        Err(e) => AccountError::Internal(format!("Invalidation subscriber task failed: {}", e)),
    }
}
