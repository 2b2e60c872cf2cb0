// Application state shared by every handler and middleware

use std::sync::Arc;
use anyhow::Result;
use tracing::info;

use crate::config::environment::{EnvironmentVariables, SessionBackend, StorageBackend};
use crate::database::{MemoryStore, PostgresStore, RedisService, SecurityStore, SessionStore};
use crate::security::auth::seed_admin;

#[derive(Debug, Clone)]
pub struct AppState {
    pub environment: Arc<EnvironmentVariables>,
    pub store: SecurityStore,
    pub sessions: SessionStore,
}

impl AppState {
    /// Connects the configured backends and seeds the admin account
    pub async fn from_environment(environment: Arc<EnvironmentVariables>) -> Result<Self> {
        let store: SecurityStore = match environment.storage_backend {
            StorageBackend::Memory => SecurityStore::Memory(MemoryStore::new()),
            StorageBackend::Postgres => {
                SecurityStore::Postgres(PostgresStore::connect(environment.clone()).await?)
            }
        };

        let sessions: SessionStore = match environment.session_backend {
            SessionBackend::Memory => SessionStore::in_memory(),
            SessionBackend::Redis => {
                SessionStore::Redis(RedisService::connect(environment.clone()).await?)
            }
        };

        let state: AppState = Self { environment, store, sessions };
        seed_admin(&state.store, &state.environment).await?;

        info!(
            "Services initialized (storage: {}, sessions: {})",
            state.store.backend_name(),
            state.environment.session_backend.as_str()
        );
        Ok(state)
    }

    /// State over in-process backends only; no admin is seeded
    pub fn in_memory(environment: Arc<EnvironmentVariables>) -> Self {
        Self {
            environment,
            store: SecurityStore::Memory(MemoryStore::new()),
            sessions: SessionStore::in_memory(),
        }
    }

    /// Gracefully shutdown all backend connections
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
        self.sessions.shutdown().await;
    }
}
