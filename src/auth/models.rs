// Authentication data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

/// Account role
///
/// Roles are flat: holding `Admin` does not grant access to a route that only
/// lists `Moderator`. Use [`RoleSet::expand_implied`] where a route opts into
/// a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Roles that this role stands in for when a hierarchy is requested
    pub fn implies(self) -> &'static [Role] {
        match self {
            Role::Admin => &[Role::Admin, Role::Moderator, Role::User],
            Role::Moderator => &[Role::Moderator, Role::User],
            Role::User => &[Role::User],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Set of roles allowed on a single route
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSet(HashSet<Role>);

impl RoleSet {
    pub fn of(roles: &[Role]) -> Self {
        Self(roles.iter().copied().collect())
    }

    /// Every role; used by routes open to any active account
    pub fn any() -> Self {
        Self::of(&[Role::User, Role::Moderator, Role::Admin])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every role that implies a member of this set.
    ///
    /// `{Moderator}` becomes `{Moderator, Admin}`. The gate never calls this;
    /// route wiring does when it wants higher roles admitted.
    pub fn expand_implied(&self) -> Self {
        let mut expanded = self.0.clone();
        for candidate in [Role::User, Role::Moderator, Role::Admin] {
            if candidate.implies().iter().any(|r| self.0.contains(r)) {
                expanded.insert(candidate);
            }
        }
        Self(expanded)
    }
}

/// User database model
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to create a user; the hash is computed before this is built
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Self-registered accounts start unverified; seeded accounts do not
    pub is_verified: bool,
}

/// User response model (excludes password_hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "a@x.com")]
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Signup request DTO
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email)]
    #[schema(example = "a@x.com")]
    pub email: String,
    #[validate(length(min = 6))]
    #[schema(example = "secret1")]
    pub password: String,
}

/// Login request DTO
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Body for refresh and logout
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token response DTO
///
/// `refresh_token` is absent on `/auth/refresh`, which only mints a new
/// access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[schema(example = "bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[schema(example = 900)]
    pub expires_in: i64,
}

/// Admin request to change a user's role
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Admin request to activate or deactivate an account
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}
