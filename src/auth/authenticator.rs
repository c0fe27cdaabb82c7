// Email/password verification against the user directory

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::auth::{
    error::AuthError,
    models::User,
    password::PasswordService,
    repository::{with_timeout, UserDirectory},
};

/// Pure credential check. Account status is the gate's concern.
pub struct Authenticator {
    directory: Arc<dyn UserDirectory>,
    passwords: PasswordService,
    directory_timeout: Duration,
    /// Verified against when the email is unknown, so both failure paths
    /// pay for one Argon2 verification
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        passwords: PasswordService,
        directory_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let dummy_hash = passwords.hash_password("placeholder-password-never-matches")?;
        Ok(Self {
            directory,
            passwords,
            directory_timeout,
            dummy_hash,
        })
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let found = with_timeout(self.directory_timeout, self.directory.find_by_email(email)).await?;

        let (hash, user) = match found {
            Some(user) => (user.password_hash.clone(), Some(user)),
            None => (self.dummy_hash.clone(), None),
        };

        let verified = self
            .passwords
            .verify_password_blocking(password.to_string(), hash)
            .await?;

        match user {
            Some(user) if verified => {
                debug!("Credentials accepted for user_id={}", user.id);
                Ok(user)
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}
