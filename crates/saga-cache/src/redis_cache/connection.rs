//! Standalone and cluster pools behind one connection type.

use crate::error::CacheResult;
use deadpool_redis::cluster;
use redis::aio::ConnectionLike;
use redis::{Cmd, Pipeline, RedisFuture, Value};

/// Pool of connections to either a single server or a Redis Cluster.
#[derive(Clone)]
pub enum RedisPool {
    Standalone(deadpool_redis::Pool),
    Cluster(cluster::Pool),
}

impl RedisPool {
    /// Checks a connection out of the pool.
    pub async fn get(&self) -> CacheResult<RedisConnection> {
        Ok(match self {
            Self::Standalone(pool) => RedisConnection::Standalone(pool.get().await?),
            Self::Cluster(pool) => RedisConnection::Cluster(pool.get().await?),
        })
    }

    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }
}

/// Pooled connection. Cluster connections route each command by its key.
pub enum RedisConnection {
    Standalone(deadpool_redis::Connection),
    Cluster(cluster::Connection),
}

impl ConnectionLike for RedisConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Standalone(conn) => conn.req_packed_command(cmd),
            Self::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Standalone(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Standalone(conn) => conn.get_db(),
            Self::Cluster(conn) => conn.get_db(),
        }
    }
}
