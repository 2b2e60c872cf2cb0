// Redis-backed key/value storage for session tokens

use std::sync::Arc;
use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;
use crate::config::environment::EnvironmentVariables;

/// Shares one auto-reconnecting connection across handlers
#[derive(Clone)]
pub struct RedisService {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisService").finish_non_exhaustive()
    }
}

impl RedisService {
    /// Opens the managed connection and verifies it with a PING
    pub async fn connect(env: Arc<EnvironmentVariables>) -> Result<Self> {
        let client: Client = Client::open(env.redis_url.as_ref())
            .context("Failed to create Redis client")?;
        let mut manager: ConnectionManager = ConnectionManager::new(client)
            .await
            .context("Failed to open Redis connection manager")?;

        let _: () = redis::cmd("PING").query_async(&mut manager).await
            .context("Failed to ping Redis")?;

        info!("Redis connection established successfully");
        Ok(Self { manager })
    }

    pub async fn shutdown(&self) {
        info!("Redis session store shutdown (connection dropped with the state)");
    }

    pub async fn set_with_ttl(&self, key: &str, value: String, ttl_seconds: u64) -> Result<()> {
        let mut conn: ConnectionManager = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await
            .with_context(|| format!("Failed to store {key} in Redis"))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn: ConnectionManager = self.manager.clone();
        conn.get(key).await
            .with_context(|| format!("Failed to read {key} from Redis"))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn: ConnectionManager = self.manager.clone();
        let _: () = conn.del(key).await
            .with_context(|| format!("Failed to delete {key} from Redis"))?;
        Ok(())
    }
}
