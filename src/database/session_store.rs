// Token sessions: access and refresh tokens mapped to the account they
// authenticate. Backed by Redis in production, an in-process map otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::redis_manager::RedisService;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn key(&self, token: &str) -> String {
        match self {
            TokenKind::Access => format!("session:access:{token}"),
            TokenKind::Refresh => format!("session:refresh:{token}"),
        }
    }
}

/// What a token resolves to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub email: String,
    pub is_staff: bool,
    /// The refresh token an access token was issued from
    pub refresh_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MemorySessions {
    entries: Arc<RwLock<HashMap<String, (SessionRecord, DateTime<Utc>)>>>,
}

#[derive(Clone, Debug)]
pub enum SessionStore {
    Memory(MemorySessions),
    Redis(RedisService),
}

impl SessionStore {
    pub fn in_memory() -> Self {
        SessionStore::Memory(MemorySessions::default())
    }

    pub async fn put(
        &self,
        kind: TokenKind,
        token: &str,
        record: &SessionRecord,
        ttl_seconds: u64,
    ) -> Result<()> {
        let key: String = kind.key(token);
        match self {
            SessionStore::Memory(m) => {
                let now: DateTime<Utc> = Utc::now();
                let expires_at: DateTime<Utc> = i64::try_from(ttl_seconds)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .context("Session TTL out of range")?;

                let mut entries = m.entries.write().await;
                // Tokens replaced by refresh are never looked up again
                entries.retain(|_, (_, expiry)| *expiry > now);
                entries.insert(key, (record.clone(), expires_at));
                Ok(())
            }
            SessionStore::Redis(r) => {
                let payload: String =
                    serde_json::to_string(record).context("Failed to encode session")?;
                r.set_with_ttl(&key, payload, ttl_seconds).await
            }
        }
    }

    /// Resolves a live token; expired or unknown tokens yield `None`
    pub async fn get(&self, kind: TokenKind, token: &str) -> Result<Option<SessionRecord>> {
        let key: String = kind.key(token);
        match self {
            SessionStore::Memory(m) => {
                let now: DateTime<Utc> = Utc::now();
                let mut entries = m.entries.write().await;
                let live: Option<Option<SessionRecord>> = entries
                    .get(&key)
                    .map(|(record, expires_at)| (*expires_at > now).then(|| record.clone()));
                match live {
                    Some(Some(record)) => Ok(Some(record)),
                    Some(None) => {
                        entries.remove(&key);
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
            SessionStore::Redis(r) => match r.get(&key).await? {
                Some(payload) => Ok(Some(
                    serde_json::from_str(&payload).context("Failed to decode session")?,
                )),
                None => Ok(None),
            },
        }
    }

    pub async fn revoke(&self, kind: TokenKind, token: &str) -> Result<()> {
        let key: String = kind.key(token);
        match self {
            SessionStore::Memory(m) => {
                m.entries.write().await.remove(&key);
                Ok(())
            }
            SessionStore::Redis(r) => r.delete(&key).await,
        }
    }

    pub async fn shutdown(&self) {
        if let SessionStore::Redis(r) = self {
            r.shutdown().await;
        }
    }
}
