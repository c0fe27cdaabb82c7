// User directory: lookup of identities by id or email

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::auth::{
    error::AuthError,
    models::{NewUser, Role, User},
};

/// Storage-agnostic access to user records.
///
/// The auth core only reads through `find_*`; the mutations exist for the
/// signup and admin routes that own account changes.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError>;

    /// Insert a user; an existing email yields `Conflict`
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;

    async fn update_role(&self, id: i32, role: Role) -> Result<Option<User>, AuthError>;

    async fn set_active(&self, id: i32, is_active: bool) -> Result<Option<User>, AuthError>;
}

/// Await a directory call, turning a timeout into `DirectoryUnavailable`
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Directory or revocation store call exceeded {:?}", limit);
            Err(AuthError::DirectoryUnavailable(format!("timed out after {:?}", limit)))
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, role, is_active, is_verified, created_at, updated_at";

/// PostgreSQL-backed directory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new PgUserDirectory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        // Unique violations surface as Conflict through From<sqlx::Error>
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, role, is_verified) VALUES (LOWER($1), $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_verified)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_active(&self, id: i32, is_active: bool) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(is_active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: i32,
    users: HashMap<i32, User>,
}

/// Process-local directory for tests and database-less runs
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    table: RwLock<MemoryTable>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.users.len()
    }

    async fn modify<F>(&self, id: i32, change: F) -> Result<Option<User>, AuthError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut table = self.table.write().await;
        Ok(table.users.get_mut(&id).map(|user| {
            change(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let needle = email.to_lowercase();
        let table = self.table.read().await;
        Ok(table.users.values().find(|u| u.email == needle).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        Ok(self.table.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let email = user.email.to_lowercase();
        let mut table = self.table.write().await;
        if table.users.values().any(|u| u.email == email) {
            return Err(AuthError::Conflict);
        }

        table.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: table.next_id,
            email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            is_verified: user.is_verified,
            created_at: now,
            updated_at: now,
        };
        table.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<Option<User>, AuthError> {
        self.modify(id, |user| user.role = role).await
    }

    async fn set_active(&self, id: i32, is_active: bool) -> Result<Option<User>, AuthError> {
        self.modify(id, |user| user.is_active = is_active).await
    }
}
