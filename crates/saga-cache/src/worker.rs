//! Fixed-size worker pool for fire-and-forget cache tasks.

use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use saga_config::CleanerConfig;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// A unit of work run by one worker.
pub type Task = BoxFuture<'static, CacheResult<()>>;

/// Resolves once `true` has been sent, or the sender is gone.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Tasks that may wait for a free worker before `submit` blocks.
    pub queue_capacity: usize,

    /// How long `stop` waits for in-flight tasks.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
            queue_capacity: 1024,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&CleanerConfig> for WorkerPoolConfig {
    fn from(config: &CleanerConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Worker pool statistics.
#[derive(Debug, Clone)]
pub struct WorkerPoolStats {
    pub id: String,
    pub running: bool,
    pub workers: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

/// Runs submitted tasks on a fixed number of tokio tasks.
///
/// Lifecycle: `new` → `start` → (`submit`/`try_submit`)* → `stop`. A stopped
/// pool cannot be restarted. Tasks still queued when `stop` is called are
/// dropped without running.
pub struct WorkerPool {
    id: String,
    config: WorkerPoolConfig,
    tx: mpsc::Sender<Task>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    stopped: AtomicBool,
    tasks_completed: Arc<AtomicU64>,
    tasks_failed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Create a new worker pool. No workers run until `start`.
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            id: format!("cache-worker-pool-{}", Uuid::new_v4()),
            config,
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            tasks_completed: Arc::new(AtomicU64::new(0)),
            tasks_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the workers.
    pub fn start(&self) -> CacheResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(CacheError::Closed("worker pool"));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CacheError::AlreadyRunning("worker pool"));
        }

        let workers = self.config.workers.max(1);
        info!(
            pool_id = %self.id,
            workers,
            queue_capacity = self.config.queue_capacity,
            "Starting worker pool"
        );
        CacheMetrics::workers(&self.id, workers);

        let mut handles = self.handles.lock();
        for index in 0..workers {
            let rx = Arc::clone(&self.rx);
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let completed = Arc::clone(&self.tasks_completed);
            let failed = Arc::clone(&self.tasks_failed);
            let pool_id = self.id.clone();

            let worker = async move {
                loop {
                    let next = tokio::select! {
                        biased;
                        () = shutdown_requested(&mut shutdown_rx) => None,
                        task = async { rx.lock().await.recv().await } => task,
                    };
                    let Some(task) = next else { break };

                    match task.await {
                        Ok(()) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                            CacheMetrics::task_completed(&pool_id);
                        }
                        Err(e) => {
                            warn!(error = %e, "Worker task failed");
                            failed.fetch_add(1, Ordering::Relaxed);
                            CacheMetrics::task_failed(&pool_id);
                        }
                    }
                }
                debug!("Worker exiting");
            };

            handles.push(tokio::spawn(
                worker.instrument(tracing::info_span!("cache_worker", pool_id = %self.id, worker = index)),
            ));
        }

        Ok(())
    }

    /// Queue a task, waiting for room when the queue is full.
    pub async fn submit<F>(&self, task: F) -> CacheResult<()>
    where
        F: Future<Output = CacheResult<()>> + Send + 'static,
    {
        if !self.is_running() {
            return Err(CacheError::PoolStopped);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            sent = self.tx.send(Box::pin(task)) => sent.map_err(|_| CacheError::PoolStopped),
            () = shutdown_requested(&mut shutdown_rx) => Err(CacheError::PoolStopped),
        }
    }

    /// Queue a task without waiting; fails with `QueueFull` when there is no room.
    pub fn try_submit<F>(&self, task: F) -> CacheResult<()>
    where
        F: Future<Output = CacheResult<()>> + Send + 'static,
    {
        if !self.is_running() {
            return Err(CacheError::PoolStopped);
        }

        self.tx.try_send(Box::pin(task)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CacheError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => CacheError::PoolStopped,
        })
    }

    /// Signal the workers to exit and wait for in-flight tasks to finish.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!(pool_id = %self.id, "Stopping worker pool...");
        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut *self.handles.lock());
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        if timeout(self.config.shutdown_timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                pool_id = %self.id,
                timeout = ?self.config.shutdown_timeout,
                "Workers did not finish in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        info!(
            pool_id = %self.id,
            completed = self.tasks_completed.load(Ordering::Relaxed),
            failed = self.tasks_failed.load(Ordering::Relaxed),
            "Worker pool stopped"
        );
    }

    /// Check if the pool is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the pool ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get pool statistics.
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            id: self.id.clone(),
            running: self.is_running(),
            workers: self.config.workers,
            queued: self.tx.max_capacity() - self.tx.capacity(),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
