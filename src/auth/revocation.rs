// Optional denylist of token ids (jti) for logout
//
// Entries only need to outlive the token they block, so every entry carries
// the token's own expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::auth::{clock::Clock, error::AuthError, repository::with_timeout};

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Block `jti` until `expires_at`
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError>;
}

/// Single-process store; entries are pruned lazily on write
#[derive(Debug)]
pub struct InMemoryRevocationStore {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            revoked: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.revoked.read().await.len()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        let now = self.clock.now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expiry| *expiry > now);
        if expires_at > now {
            revoked.insert(jti.to_string(), expires_at);
        }
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let now = self.clock.now();
        Ok(self
            .revoked
            .read()
            .await
            .get(jti)
            .is_some_and(|expiry| *expiry > now))
    }
}

/// Shared store for multi-instance deployments; Redis expires the keys
#[derive(Clone)]
pub struct RedisRevocationStore {
    connection: ConnectionManager,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl RedisRevocationStore {
    /// Every command, and the initial connect, is bounded by `timeout`
    pub async fn connect(url: &str, clock: Arc<dyn Clock>, timeout: Duration) -> Result<Self, AuthError> {
        tracing::info!("Connecting revocation store to Redis...");
        let client = redis::Client::open(url).map_err(redis_unavailable)?;
        let connection = with_timeout(timeout, async {
            ConnectionManager::new(client).await.map_err(redis_unavailable)
        })
        .await?;
        tracing::info!("Revocation store connected");
        Ok(Self { connection, clock, timeout })
    }

    fn key(jti: &str) -> String {
        format!("revoked:{}", jti)
    }
}

fn redis_unavailable(err: redis::RedisError) -> AuthError {
    AuthError::DirectoryUnavailable(format!("revocation store: {}", err))
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        let remaining = (expires_at - self.clock.now()).num_seconds();
        if remaining <= 0 {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let command = async {
            redis::cmd("SET")
                .arg(Self::key(jti))
                .arg(1)
                .arg("EX")
                .arg(remaining)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(redis_unavailable)
        };
        with_timeout(self.timeout, command).await
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let mut conn = self.connection.clone();
        let command = async {
            redis::cmd("EXISTS")
                .arg(Self::key(jti))
                .query_async::<_, bool>(&mut conn)
                .await
                .map_err(redis_unavailable)
        };
        with_timeout(self.timeout, command).await
    }
}
