//! Redis implementation of the distributed tier.

use super::{create_pool, RedisConnection, RedisMutex, RedisPool};
use crate::distributed::{DistributedCache, DistributedMutex, MessageStream, MutexOptions, PipelineOp, TtlPolicy};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Cmd, Value};
use saga_config::RedisConfig;
use tracing::{debug, info, warn};

/// Distributed tier backed by a Redis server or a Redis Cluster.
///
/// Commands go through a pooled connection; each subscription opens its own
/// dedicated pub/sub connection from `client`, which points at a single node
/// even in cluster mode.
pub struct RedisCache {
    pool: RedisPool,
    client: redis::Client,
    ttl: TtlPolicy,
    mutex_options: MutexOptions,
}

impl RedisCache {
    /// Create a cache over existing connections.
    #[must_use]
    pub fn new(pool: RedisPool, client: redis::Client, ttl: TtlPolicy, mutex_options: MutexOptions) -> Self {
        Self {
            pool,
            client,
            ttl,
            mutex_options,
        }
    }

    /// Connect using the application configuration.
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let pool = create_pool(config).await?;
        let client = redis::Client::open(config.pubsub_url())?;

        info!(
            cluster = config.cluster_mode(),
            pubsub = %config.pubsub_url(),
            "Connected distributed cache to Redis"
        );

        Ok(Self::new(pool, client, TtlPolicy::from(config), MutexOptions::from(config)))
    }

    async fn get_conn(&self) -> CacheResult<RedisConnection> {
        self.pool.get().await
    }
}

/// Builds the Redis command for one batched operation.
fn command(op: &PipelineOp, ttl: &TtlPolicy) -> Cmd {
    match op {
        PipelineOp::Set { key, value } => {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value).arg("EX").arg(ttl.next_ttl_secs());
            cmd
        }
        PipelineOp::Delete { key } => {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            cmd
        }
    }
}

/// Checks one pipeline reply against the command that produced it.
fn check_reply(op: &PipelineOp, reply: &Value) -> CacheResult<()> {
    let ok = match (op, reply) {
        (PipelineOp::Set { .. }, Value::Okay) | (PipelineOp::Delete { .. }, Value::Int(_)) => true,
        (PipelineOp::Set { .. }, Value::SimpleString(s)) => s == "OK",
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(CacheError::Pipeline {
            op: op.kind(),
            key: op.key().to_string(),
            message: format!("unexpected reply {:?}", reply),
        })
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        if value.is_some() {
            debug!(key = %key, "Distributed cache hit");
        }

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String) -> CacheResult<()> {
        let mut conn = self.get_conn().await?;
        let ttl = self.ttl.next_ttl_secs();
        conn.set_ex::<_, _, ()>(key, value, ttl).await?;

        debug!(key = %key, ttl_secs = ttl, "Stored value in distributed cache");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exec_pipeline(&self, ops: Vec<PipelineOp>) -> CacheResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;

        // Keys of one batch usually hash to different slots, so a cluster
        // gets the commands one by one.
        if self.pool.is_cluster() {
            for op in &ops {
                let reply: Value = command(op, &self.ttl).query_async(&mut conn).await?;
                check_reply(op, &reply)?;
            }
            debug!(commands = ops.len(), "Executed Redis batch on cluster");
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for op in &ops {
            pipe.add_command(command(op, &self.ttl));
        }

        let replies: Vec<Value> = pipe.query_async(&mut conn).await?;

        if replies.len() != ops.len() {
            let last = &ops[replies.len().min(ops.len() - 1)];
            return Err(CacheError::Pipeline {
                op: last.kind(),
                key: last.key().to_string(),
                message: format!("expected {} replies, got {}", ops.len(), replies.len()),
            });
        }

        for (op, reply) in ops.iter().zip(&replies) {
            check_reply(op, reply)?;
        }

        debug!(commands = ops.len(), "Executed Redis pipeline");
        Ok(())
    }

    fn mutex(&self, name: &str) -> Box<dyn DistributedMutex> {
        Box::new(RedisMutex::new(self.pool.clone(), name, self.mutex_options))
    }

    async fn publish_raw(&self, topic: &str, payload: String) -> CacheResult<()> {
        let mut conn = self.get_conn().await?;
        let receivers: i64 = conn.publish(topic, payload).await?;

        debug!(topic = %topic, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> CacheResult<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        info!(topic = %topic, "Subscribed to Redis channel");

        let topic = topic.to_string();
        let stream = pubsub
            .into_on_message()
            .filter_map(move |msg| {
                let payload = msg.get_payload::<String>();
                let topic = topic.clone();
                async move {
                    match payload {
                        Ok(payload) => Some(payload),
                        Err(e) => {
                            warn!(topic = %topic, error = %e, "Dropping non-text pubsub payload");
                            None
                        }
                    }
                }
            })
            .boxed();

        Ok(stream)
    }
}
