// Role-based authorization of bearer-authenticated requests

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::auth::{
    codec::TokenKind,
    error::AuthError,
    models::{Role, RoleSet, User},
    repository::{with_timeout, UserDirectory},
    revocation::RevocationStore,
    token::TokenService,
};

/// Where the gate reads the acting role from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleCheck {
    /// Current role from the directory; demotions apply on the next request
    #[default]
    Live,
    /// Role embedded in the access token at issuance
    Token,
}

impl FromStr for RoleCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(RoleCheck::Live),
            "token" => Ok(RoleCheck::Token),
            other => Err(format!("unknown role check mode '{}'", other)),
        }
    }
}

pub struct AuthorizationGate {
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
    revocations: Option<Arc<dyn RevocationStore>>,
    role_check: RoleCheck,
    directory_timeout: Duration,
}

impl AuthorizationGate {
    pub fn new(
        tokens: Arc<TokenService>,
        directory: Arc<dyn UserDirectory>,
        revocations: Option<Arc<dyn RevocationStore>>,
        role_check: RoleCheck,
        directory_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            directory,
            revocations,
            role_check,
            directory_timeout,
        }
    }

    /// Resolve the acting user and check them against `allowed`.
    ///
    /// Inactive accounts are refused before the role comparison.
    pub async fn require(&self, bearer: Option<&str>, allowed: &RoleSet) -> Result<User, AuthError> {
        let token = bearer.ok_or(AuthError::Unauthenticated)?;
        let claims = self.tokens.decode(token, TokenKind::Access)?;

        if let Some(store) = &self.revocations {
            if with_timeout(self.directory_timeout, store.is_revoked(&claims.jti)).await? {
                debug!("Revoked access token presented for user_id={}", claims.sub);
                return Err(AuthError::Unauthenticated);
            }
        }

        let user = with_timeout(self.directory_timeout, self.directory.find_by_id(claims.sub))
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }

        let role: Role = match self.role_check {
            RoleCheck::Live => user.role,
            RoleCheck::Token => claims.role.ok_or(AuthError::Unauthenticated)?,
        };

        if !allowed.contains(role) {
            return Err(AuthError::Forbidden { actual: role });
        }

        debug!("Authorization successful: user_id={}, role={}", user.id, role);
        Ok(user)
    }
}
