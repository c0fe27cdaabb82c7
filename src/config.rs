// Startup configuration read from the environment (.env supported)
//
// Loaded once in `main` and passed down explicitly; nothing reads the
// environment after startup.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::auth::{codec::is_supported_algorithm, gate::RoleCheck};

/// Upper bounds keep every issued `exp` comfortably inside chrono's range
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TTL_DAYS: i64 = 365;
pub const MAX_DIRECTORY_TIMEOUT_MS: i64 = 60_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Token and gate settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub role_check: RoleCheck,
    pub directory_timeout: Duration,
}

impl AuthConfig {
    /// Defaults for everything except the secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            role_check: RoleCheck::Live,
            directory_timeout: Duration::from_millis(2000),
        }
    }
}

/// Admin account seeded at startup when missing
#[derive(Clone)]
pub struct FirstAdminConfig {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for FirstAdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstAdminConfig")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Per-IP limit applied to signup and login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// In-memory directory when unset
    pub database_url: Option<String>,
    /// Enables the Redis revocation store; tokens are purely stateless otherwise
    pub redis_url: Option<String>,
    pub rate_limit: Option<RateLimitConfig>,
    pub first_admin: Option<FirstAdminConfig>,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map; `from_env` delegates here
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let algorithm = match get("JWT_ALGORITHM") {
            Some(name) => {
                let algorithm = Algorithm::from_str(&name.to_uppercase()).map_err(|e| ConfigError::Invalid {
                    key: "JWT_ALGORITHM",
                    reason: e.to_string(),
                })?;
                if !is_supported_algorithm(algorithm) {
                    return Err(ConfigError::Invalid {
                        key: "JWT_ALGORITHM",
                        reason: format!("{} is not an HMAC algorithm", name),
                    });
                }
                algorithm
            }
            None => Algorithm::HS256,
        };

        let access_ttl_minutes = parse_bounded(
            get("ACCESS_TOKEN_EXPIRE_MINUTES"),
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            15,
            MAX_ACCESS_TTL_MINUTES,
        )?;
        let refresh_ttl_days = parse_bounded(
            get("REFRESH_TOKEN_EXPIRE_DAYS"),
            "REFRESH_TOKEN_EXPIRE_DAYS",
            7,
            MAX_REFRESH_TTL_DAYS,
        )?;
        let timeout_ms = parse_bounded(
            get("DIRECTORY_TIMEOUT_MS"),
            "DIRECTORY_TIMEOUT_MS",
            2000,
            MAX_DIRECTORY_TIMEOUT_MS,
        )?;

        let role_check = match get("ROLE_CHECK") {
            Some(mode) => mode
                .parse::<RoleCheck>()
                .map_err(|reason| ConfigError::Invalid { key: "ROLE_CHECK", reason })?,
            None => RoleCheck::Live,
        };

        let rate_limit = match (get("LOGIN_RATE_PER_SECOND"), get("LOGIN_RATE_BURST")) {
            (None, None) => None,
            (per_second, burst) => {
                let per_second = parse_bounded(per_second, "LOGIN_RATE_PER_SECOND", 1, i64::MAX)?;
                let burst = parse_bounded(burst, "LOGIN_RATE_BURST", 5, i64::MAX)?;
                Some(RateLimitConfig {
                    per_second: u64::try_from(per_second).map_err(|e| ConfigError::Invalid {
                        key: "LOGIN_RATE_PER_SECOND",
                        reason: e.to_string(),
                    })?,
                    burst_size: u32::try_from(burst).map_err(|e| ConfigError::Invalid {
                        key: "LOGIN_RATE_BURST",
                        reason: e.to_string(),
                    })?,
                })
            }
        };

        let first_admin = match (get("FIRST_ADMIN_EMAIL"), get("FIRST_ADMIN_PASSWORD")) {
            (None, None) => None,
            (Some(email), Some(password)) => Some(FirstAdminConfig { email, password }),
            (None, Some(_)) => return Err(ConfigError::Missing("FIRST_ADMIN_EMAIL")),
            (Some(_), None) => return Err(ConfigError::Missing("FIRST_ADMIN_PASSWORD")),
        };

        let port = match get("PORT") {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            rate_limit,
            first_admin,
            auth: AuthConfig {
                secret,
                algorithm,
                access_ttl_minutes,
                refresh_ttl_days,
                role_check,
                directory_timeout: Duration::from_millis(timeout_ms as u64),
            },
        })
    }
}

fn parse_bounded(value: Option<String>, key: &'static str, default: i64, max: i64) -> Result<i64, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(n) if n > 0 && n <= max => Ok(n),
        Ok(n) if n <= 0 => Err(ConfigError::Invalid { key, reason: format!("{} must be positive", n) }),
        Ok(n) => Err(ConfigError::Invalid { key, reason: format!("{} exceeds the maximum of {}", n, max) }),
        Err(e) => Err(ConfigError::Invalid { key, reason: e.to_string() }),
    }
}
