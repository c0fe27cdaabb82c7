// Authentication service - business logic layer

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::{
    authenticator::Authenticator,
    codec::TokenKind,
    error::AuthError,
    models::{NewUser, Role, TokenPair, User, UserResponse},
    password::PasswordService,
    repository::{with_timeout, UserDirectory},
    revocation::RevocationStore,
    token::TokenService,
};

/// Authentication service coordinating signup, login, refresh and logout
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    authenticator: Authenticator,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    revocations: Option<Arc<dyn RevocationStore>>,
    directory_timeout: Duration,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
        revocations: Option<Arc<dyn RevocationStore>>,
        directory_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let authenticator = Authenticator::new(directory.clone(), passwords.clone(), directory_timeout)?;
        Ok(Self {
            directory,
            authenticator,
            passwords,
            tokens,
            revocations,
            directory_timeout,
        })
    }

    /// Register a new user with the default role
    pub async fn signup(&self, email: &str, password: &str) -> Result<UserResponse, AuthError> {
        PasswordService::validate_password_strength(password)?;

        if with_timeout(self.directory_timeout, self.directory.find_by_email(email))
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.passwords.hash_password_blocking(password.to_string()).await?;
        let user = with_timeout(
            self.directory_timeout,
            self.directory.create(NewUser {
                email: email.to_lowercase(),
                password_hash,
                role: Role::User,
                is_verified: false,
            }),
        )
        .await?;

        info!("Registered user_id={}", user.id);
        Ok(user.into())
    }

    /// Seed an active, verified admin unless the email is already taken.
    ///
    /// An existing account is left untouched, whatever its role, so
    /// restarts never duplicate or re-promote anyone.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<UserResponse, AuthError> {
        if let Some(existing) = with_timeout(self.directory_timeout, self.directory.find_by_email(email)).await? {
            if existing.role == Role::Admin {
                info!("Admin user already exists: user_id={}", existing.id);
            } else {
                warn!(
                    "Admin seed email belongs to user_id={} with role {}; leaving it unchanged",
                    existing.id, existing.role
                );
            }
            return Ok(existing.into());
        }

        PasswordService::validate_password_strength(password)?;
        let password_hash = self.passwords.hash_password_blocking(password.to_string()).await?;
        let admin = with_timeout(
            self.directory_timeout,
            self.directory.create(NewUser {
                email: email.to_lowercase(),
                password_hash,
                role: Role::Admin,
                is_verified: true,
            }),
        )
        .await?;

        info!("Admin user created: user_id={}", admin.id);
        Ok(admin.into())
    }

    /// Verify credentials and issue both tokens
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self.authenticator.authenticate(email, password).await?;
        let pair = self.tokens.issue_pair(&user)?;
        info!("User logged in: user_id={}", user.id);
        Ok(pair)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token itself is returned to nobody and stays valid until
    /// its own expiry or revocation.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.decode(refresh_token, TokenKind::Refresh)?;
        self.ensure_not_revoked(&claims.jti).await?;

        let user = self.active_user(claims.sub).await?;
        debug!("Refreshing access token for user_id={}", user.id);

        Ok(TokenPair {
            access_token: self.tokens.issue_access(&user)?,
            refresh_token: None,
            token_type: "bearer".to_string(),
            expires_in: self.tokens.access_token_duration().num_seconds(),
        })
    }

    /// Revoke the presented access token and refresh token.
    ///
    /// Without a revocation store there is nothing to record and tokens run
    /// to natural expiry.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let access = self.tokens.decode(access_token, TokenKind::Access)?;
        let refresh = self.tokens.decode(refresh_token, TokenKind::Refresh)?;
        if access.sub != refresh.sub {
            return Err(AuthError::Unauthenticated);
        }

        let Some(store) = &self.revocations else {
            debug!("No revocation store configured; logout is client-side only");
            return Ok(());
        };

        for claims in [&access, &refresh] {
            let expires_at = claims.expires_at().ok_or(AuthError::Malformed)?;
            with_timeout(self.directory_timeout, store.revoke(&claims.jti, expires_at)).await?;
        }

        info!("User logged out: user_id={}", access.sub);
        Ok(())
    }

    /// Get current user information
    pub async fn get_user(&self, user_id: i32) -> Result<UserResponse, AuthError> {
        with_timeout(self.directory_timeout, self.directory.find_by_id(user_id))
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::NotFound)
    }

    pub async fn update_role(&self, user_id: i32, role: Role) -> Result<UserResponse, AuthError> {
        let user = with_timeout(self.directory_timeout, self.directory.update_role(user_id, role))
            .await?
            .ok_or(AuthError::NotFound)?;
        info!("Changed role of user_id={} to {}", user.id, user.role);
        Ok(user.into())
    }

    pub async fn set_active(&self, user_id: i32, is_active: bool) -> Result<UserResponse, AuthError> {
        let user = with_timeout(self.directory_timeout, self.directory.set_active(user_id, is_active))
            .await?
            .ok_or(AuthError::NotFound)?;
        info!("Set is_active={} for user_id={}", user.is_active, user.id);
        Ok(user.into())
    }

    async fn ensure_not_revoked(&self, jti: &str) -> Result<(), AuthError> {
        if let Some(store) = &self.revocations {
            if with_timeout(self.directory_timeout, store.is_revoked(jti)).await? {
                return Err(AuthError::Unauthenticated);
            }
        }
        Ok(())
    }

    async fn active_user(&self, user_id: i32) -> Result<User, AuthError> {
        let user = with_timeout(self.directory_timeout, self.directory.find_by_id(user_id))
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::codec::TokenCodec;
    use crate::auth::repository::InMemoryUserDirectory;
    use crate::auth::revocation::InMemoryRevocationStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use jsonwebtoken::Algorithm;

    struct Fixture {
        service: AuthService,
        directory: Arc<InMemoryUserDirectory>,
        tokens: Arc<TokenService>,
        clock: Arc<ManualClock>,
    }

    fn fixture(with_revocation: bool) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let codec = TokenCodec::new("service_test_secret", Algorithm::HS256, clock.clone()).unwrap();
        let tokens = Arc::new(TokenService::new(codec, 15, 7).unwrap());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let revocations: Option<Arc<dyn RevocationStore>> = if with_revocation {
            Some(Arc::new(InMemoryRevocationStore::new(clock.clone())))
        } else {
            None
        };

        let service = AuthService::new(
            directory.clone(),
            PasswordService::for_tests(),
            tokens.clone(),
            revocations,
            Duration::from_secs(2),
        )
        .unwrap();

        Fixture { service, directory, tokens, clock }
    }

    #[tokio::test]
    async fn test_signup_once_then_conflict() {
        let fx = fixture(false);
        let created = fx.service.signup("a@x.com", "secret1").await.unwrap();
        assert_eq!(created.email, "a@x.com");
        assert_eq!(created.role, Role::User);

        let again = fx.service.signup("a@x.com", "secret1").await;
        assert!(matches!(again, Err(AuthError::Conflict)));
        assert_eq!(fx.directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_signup_normalizes_email_case() {
        let fx = fixture(false);
        fx.service.signup("A@X.com", "secret1").await.unwrap();
        assert!(matches!(
            fx.service.signup("a@x.COM", "other12").await,
            Err(AuthError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_signup_stores_hash_not_plaintext() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let stored = fx.directory.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_signup_rejects_short_password() {
        let fx = fixture(false);
        assert!(matches!(
            fx.service.signup("a@x.com", "abc").await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(fx.directory.len().await, 0);
    }

    #[tokio::test]
    async fn test_login_issues_pair() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();

        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        let access = fx.tokens.decode(&pair.access_token, TokenKind::Access).unwrap();
        let refresh = fx.tokens.decode(pair.refresh_token.as_deref().unwrap(), TokenKind::Refresh).unwrap();
        assert_eq!(access.sub, refresh.sub);
        assert_eq!(access.role, Some(Role::User));
    }

    #[tokio::test]
    async fn test_login_failures_identical() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();

        let wrong = fx.service.login("a@x.com", "wrong12").await.unwrap_err();
        let missing = fx.service.login("nobody@x.com", "secret1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(missing, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_returns_new_access_token_only() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();

        fx.clock.advance(ChronoDuration::minutes(20));
        let refreshed = fx.service.refresh(pair.refresh_token.as_deref().unwrap()).await.unwrap();

        assert!(refreshed.refresh_token.is_none());
        assert!(fx.tokens.decode(&refreshed.access_token, TokenKind::Access).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();

        assert!(matches!(
            fx.service.refresh(&pair.access_token).await,
            Err(AuthError::WrongTokenType)
        ));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_change() {
        let fx = fixture(false);
        let user = fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        fx.service.update_role(user.id, Role::Moderator).await.unwrap();

        let refreshed = fx.service.refresh(pair.refresh_token.as_deref().unwrap()).await.unwrap();
        let claims = fx.tokens.decode(&refreshed.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.role, Some(Role::Moderator));
    }

    #[tokio::test]
    async fn test_refresh_refused_for_inactive_user() {
        let fx = fixture(false);
        let user = fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        fx.service.set_active(user.id, false).await.unwrap();

        assert!(matches!(
            fx.service.refresh(pair.refresh_token.as_deref().unwrap()).await,
            Err(AuthError::InactiveAccount)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let fx = fixture(true);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        let refresh = pair.refresh_token.unwrap();

        fx.service.logout(&pair.access_token, &refresh).await.unwrap();
        assert!(matches!(
            fx.service.refresh(&refresh).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_logout_without_store_is_stateless() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        let refresh = pair.refresh_token.unwrap();

        fx.service.logout(&pair.access_token, &refresh).await.unwrap();
        assert!(fx.service.refresh(&refresh).await.is_ok());
    }

    struct StalledStore;

    #[async_trait::async_trait]
    impl RevocationStore for StalledStore {
        async fn revoke(&self, _jti: &str, _expires_at: chrono::DateTime<Utc>) -> Result<(), AuthError> {
            std::future::pending().await
        }

        async fn is_revoked(&self, _jti: &str) -> Result<bool, AuthError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_revocation_store_fails_logout_and_refresh() {
        let fx = fixture(false);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        let pair = fx.service.login("a@x.com", "secret1").await.unwrap();
        let refresh = pair.refresh_token.unwrap();

        let stalled = AuthService::new(
            fx.directory.clone(),
            PasswordService::for_tests(),
            fx.tokens.clone(),
            Some(Arc::new(StalledStore)),
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(matches!(
            stalled.logout(&pair.access_token, &refresh).await,
            Err(AuthError::DirectoryUnavailable(_))
        ));
        assert!(matches!(
            stalled.refresh(&refresh).await,
            Err(AuthError::DirectoryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_rejects_mismatched_tokens() {
        let fx = fixture(true);
        fx.service.signup("a@x.com", "secret1").await.unwrap();
        fx.service.signup("b@x.com", "secret1").await.unwrap();
        let a = fx.service.login("a@x.com", "secret1").await.unwrap();
        let b = fx.service.login("b@x.com", "secret1").await.unwrap();

        let result = fx
            .service
            .logout(&a.access_token, b.refresh_token.as_deref().unwrap())
            .await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_admin_updates_missing_user() {
        let fx = fixture(false);
        assert!(matches!(fx.service.update_role(9, Role::Admin).await, Err(AuthError::NotFound)));
        assert!(matches!(fx.service.set_active(9, false).await, Err(AuthError::NotFound)));
        assert!(matches!(fx.service.get_user(9).await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_ensure_admin_seeds_verified_admin_once() {
        let fx = fixture(false);

        let seeded = fx.service.ensure_admin("Root@X.com", "rootpass").await.unwrap();
        assert_eq!(seeded.email, "root@x.com");
        assert_eq!(seeded.role, Role::Admin);
        assert!(seeded.is_active);
        assert!(seeded.is_verified);

        // Second startup finds the account and changes nothing
        let again = fx.service.ensure_admin("root@x.com", "different-pass").await.unwrap();
        assert_eq!(again.id, seeded.id);
        assert_eq!(fx.directory.len().await, 1);

        let pair = fx.service.login("root@x.com", "rootpass").await.unwrap();
        let claims = fx.tokens.decode(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_ensure_admin_leaves_existing_user_alone() {
        let fx = fixture(false);
        let user = fx.service.signup("taken@x.com", "secret1").await.unwrap();

        let result = fx.service.ensure_admin("taken@x.com", "rootpass").await.unwrap();
        assert_eq!(result.id, user.id);
        assert_eq!(result.role, Role::User);
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_weak_password() {
        let fx = fixture(false);
        assert!(matches!(
            fx.service.ensure_admin("root@x.com", "123").await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(fx.directory.len().await, 0);
    }
}
