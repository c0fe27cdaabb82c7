// Password hashing and validation service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::auth::error::AuthError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Password service for hashing and verification
///
/// Uses Argon2id. Verification reads the algorithm and cost parameters from
/// the stored PHC string, so digests made with older parameters still verify.
#[derive(Debug, Clone)]
pub struct PasswordService {
    params: Params,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self { params: Params::default() }
    }
}

impl PasswordService {
    /// Build a service with explicit Argon2 costs (memory in KiB)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::Internal(format!("invalid argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    /// Cheap parameters so tests do not spend seconds per hash
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::with_params(1024, 1, 1).expect("static test params are valid")
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id with a fresh random salt
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
    }

    /// Verify a password against a stored digest.
    ///
    /// Malformed or unsupported digests verify as false.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    /// Hash on the blocking pool so request tasks keep running
    pub async fn hash_password_blocking(&self, password: String) -> Result<String, AuthError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool
    pub async fn verify_password_blocking(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))
    }

    /// Validate password strength requirements
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}
