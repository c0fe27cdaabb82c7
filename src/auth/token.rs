// Access/refresh token issuance and typed verification

use chrono::Duration;
use uuid::Uuid;

use crate::auth::{
    codec::{Claims, TokenCodec, TokenKind},
    error::AuthError,
    models::{TokenPair, User},
};

/// Token service for JWT operations
///
/// Both kinds share the codec's secret and algorithm. The `token_type`
/// claim, not the lifetime, decides which verifier accepts a token.
#[derive(Debug, Clone)]
pub struct TokenService {
    codec: TokenCodec,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl TokenService {
    /// Defaults are 15 minutes for access tokens and 7 days for refresh tokens.
    ///
    /// Lifetimes must be positive and representable as a `chrono::Duration`.
    pub fn new(codec: TokenCodec, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Result<Self, AuthError> {
        let access_token_duration = Duration::try_minutes(access_ttl_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| AuthError::Internal(format!("invalid access token lifetime: {}m", access_ttl_minutes)))?;
        let refresh_token_duration = Duration::try_days(refresh_ttl_days)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| AuthError::Internal(format!("invalid refresh token lifetime: {}d", refresh_ttl_days)))?;

        Ok(Self {
            codec,
            access_token_duration,
            refresh_token_duration,
        })
    }

    pub fn access_token_duration(&self) -> Duration {
        self.access_token_duration
    }

    fn claims_for(&self, user: &User, kind: TokenKind) -> Result<Claims, AuthError> {
        let now = self.codec.now();
        let (role, ttl) = match kind {
            TokenKind::Access => (Some(user.role), self.access_token_duration),
            TokenKind::Refresh => (None, self.refresh_token_duration),
        };
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal(format!("token expiry out of range for ttl {}", ttl)))?;

        Ok(Claims {
            sub: user.id,
            role,
            token_type: kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })
    }

    /// Generate an access token carrying the user's current role
    pub fn issue_access(&self, user: &User) -> Result<String, AuthError> {
        self.codec.encode(&self.claims_for(user, TokenKind::Access)?)
    }

    /// Generate a refresh token; it carries no role
    pub fn issue_refresh(&self, user: &User) -> Result<String, AuthError> {
        self.codec.encode(&self.claims_for(user, TokenKind::Refresh)?)
    }

    /// Generate both access and refresh tokens
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_access(user)?,
            refresh_token: Some(self.issue_refresh(user)?),
            token_type: "bearer".to_string(),
            expires_in: self.access_token_duration.num_seconds(),
        })
    }

    /// Verify a token and require it to be of `expected` kind
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token)?;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::models::Role;
    use chrono::Utc;
    use jsonwebtoken::Algorithm;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn test_user(id: i32, role: Role) -> User {
        let now = Utc::now();
        User {
            id,
            email: format!("user{}@example.com", id),
            password_hash: "unused".to_string(),
            role,
            is_active: true,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    // Helper to create a test token service on a frozen clock
    fn test_token_service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let codec = TokenCodec::new(
            "test_secret_key_for_testing_purposes",
            Algorithm::HS256,
            clock.clone(),
        )
        .unwrap();
        (TokenService::new(codec, 15, 7).unwrap(), clock)
    }

    #[test]
    fn test_access_token_expiration_is_15_minutes() {
        let (service, _) = test_token_service();
        let token = service.issue_access(&test_user(1, Role::User)).unwrap();
        let claims = service.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_expiration_is_7_days() {
        let (service, _) = test_token_service();
        let token = service.issue_refresh(&test_user(1, Role::User)).unwrap();
        let claims = service.decode(&token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_access_token_embeds_role_refresh_does_not() {
        let (service, _) = test_token_service();
        let user = test_user(42, Role::Admin);

        let access = service.decode(&service.issue_access(&user).unwrap(), TokenKind::Access).unwrap();
        assert_eq!(access.sub, 42);
        assert_eq!(access.role, Some(Role::Admin));

        let refresh = service.decode(&service.issue_refresh(&user).unwrap(), TokenKind::Refresh).unwrap();
        assert_eq!(refresh.sub, 42);
        assert_eq!(refresh.role, None);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let (service, _) = test_token_service();
        let refresh = service.issue_refresh(&test_user(1, Role::User)).unwrap();
        assert!(matches!(
            service.decode(&refresh, TokenKind::Access),
            Err(AuthError::WrongTokenType)
        ));
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let (service, _) = test_token_service();
        let access = service.issue_access(&test_user(1, Role::User)).unwrap();
        assert!(matches!(
            service.decode(&access, TokenKind::Refresh),
            Err(AuthError::WrongTokenType)
        ));
    }

    #[test]
    fn test_access_expires_while_refresh_still_valid() {
        let (service, clock) = test_token_service();
        let pair = service.issue_pair(&test_user(1, Role::User)).unwrap();
        let refresh = pair.refresh_token.unwrap();

        clock.advance(Duration::minutes(16));
        assert!(matches!(
            service.decode(&pair.access_token, TokenKind::Access),
            Err(AuthError::Expired)
        ));
        assert!(service.decode(&refresh, TokenKind::Refresh).is_ok());
        // Still a refresh token even though it outlives the access window
        assert!(matches!(
            service.decode(&refresh, TokenKind::Access),
            Err(AuthError::WrongTokenType)
        ));
    }

    #[test]
    fn test_refresh_expires_after_7_days() {
        let (service, clock) = test_token_service();
        let refresh = service.issue_refresh(&test_user(1, Role::User)).unwrap();
        clock.advance(Duration::days(7));
        assert!(matches!(
            service.decode(&refresh, TokenKind::Refresh),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_issue_pair() {
        let (service, clock) = test_token_service();
        let pair = service.issue_pair(&test_user(1, Role::User)).unwrap();

        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.expires_in, 900);
        let refresh = pair.refresh_token.clone().unwrap();
        assert_ne!(pair.access_token, refresh);

        let claims = service.decode(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.iat, clock.now().timestamp());
    }

    #[test]
    fn test_every_token_has_unique_id() {
        let (service, _) = test_token_service();
        let user = test_user(1, Role::User);
        let a = service.decode(&service.issue_access(&user).unwrap(), TokenKind::Access).unwrap();
        let b = service.decode(&service.issue_access(&user).unwrap(), TokenKind::Access).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_custom_ttls() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let codec = TokenCodec::new("secret", Algorithm::HS384, clock).unwrap();
        let service = TokenService::new(codec, 5, 1).unwrap();
        let user = test_user(3, Role::Moderator);

        let access = service.decode(&service.issue_access(&user).unwrap(), TokenKind::Access).unwrap();
        assert_eq!(access.exp - access.iat, 300);
        let refresh = service.decode(&service.issue_refresh(&user).unwrap(), TokenKind::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 86400);
    }

    #[test]
    fn test_unrepresentable_ttls_rejected() {
        let codec = || TokenCodec::new("secret", Algorithm::HS256, Arc::new(ManualClock::new(Utc::now()))).unwrap();

        assert!(matches!(TokenService::new(codec(), i64::MAX, 7), Err(AuthError::Internal(_))));
        assert!(matches!(TokenService::new(codec(), 15, i64::MAX), Err(AuthError::Internal(_))));
        assert!(matches!(TokenService::new(codec(), 0, 7), Err(AuthError::Internal(_))));
        assert!(matches!(TokenService::new(codec(), 15, -1), Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_expiry_past_calendar_range_is_an_error() {
        // Representable as a duration, but now + ttl overflows the calendar
        let service = TokenService::new(
            TokenCodec::new("secret", Algorithm::HS256, Arc::new(ManualClock::new(Utc::now()))).unwrap(),
            15,
            100_000_000,
        )
        .unwrap();
        let user = test_user(1, Role::User);

        assert!(matches!(service.issue_refresh(&user), Err(AuthError::Internal(_))));
        assert!(matches!(service.issue_pair(&user), Err(AuthError::Internal(_))));
        assert!(service.issue_access(&user).is_ok());
    }

    proptest! {
        #[test]
        fn prop_refresh_never_accepted_as_access(user_id in 1i32..1000000) {
            let (service, _) = test_token_service();
            let token = service.issue_refresh(&test_user(user_id, Role::Admin))?;
            prop_assert!(matches!(
                service.decode(&token, TokenKind::Access),
                Err(AuthError::WrongTokenType)
            ));
        }

        #[test]
        fn prop_token_claims_contain_identity(user_id in 1i32..1000000) {
            let (service, _) = test_token_service();
            let user = test_user(user_id, Role::User);

            let access_claims = service.decode(&service.issue_access(&user)?, TokenKind::Access)?;
            prop_assert_eq!(access_claims.sub, user_id);
            prop_assert_eq!(access_claims.token_type, TokenKind::Access);

            let refresh_claims = service.decode(&service.issue_refresh(&user)?, TokenKind::Refresh)?;
            prop_assert_eq!(refresh_claims.sub, user_id);
            prop_assert_eq!(refresh_claims.token_type, TokenKind::Refresh);
        }

        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let (service, _) = test_token_service();
            prop_assert!(matches!(
                service.decode(&malformed, TokenKind::Access),
                Err(AuthError::Malformed)
            ));
        }
    }
}
