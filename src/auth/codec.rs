// Signed, time-bound token encoding (JWT)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    crypto, decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::auth::{clock::Clock, error::AuthError, models::Role};

/// Distinguishes access from refresh tokens inside the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32, // user_id
    /// Role at issuance; access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub token_type: TokenKind,
    pub jti: String,
    pub iat: i64, // issued at timestamp
    pub exp: i64, // expiration timestamp
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Encodes and verifies tokens with one shared secret and one HMAC algorithm
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// HMAC family only: the secret is a shared string, so asymmetric
/// algorithms cannot be configured.
pub fn is_supported_algorithm(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

impl TokenCodec {
    pub fn new(secret: &str, algorithm: Algorithm, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if !is_supported_algorithm(algorithm) {
            return Err(AuthError::Internal(format!(
                "unsupported signing algorithm {:?}",
                algorithm
            )));
        }
        if secret.is_empty() {
            return Err(AuthError::Internal("signing secret is empty".to_string()));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            clock,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token encoding failed: {}", e)))
    }

    /// Verify signature, algorithm and expiry, whatever the token kind.
    ///
    /// Expiry is checked against the injected clock; the library's own
    /// time check is disabled.
    pub(crate) fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_signature(token)?;

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::SignatureInvalid,
                _ => AuthError::Malformed,
            })?;

        if claims.exp <= claims.iat {
            return Err(AuthError::Malformed);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Check the MAC over `header.payload` before either segment is parsed,
    /// so a change anywhere in a three-segment token is a signature failure.
    fn verify_signature(&self, token: &str) -> Result<(), AuthError> {
        let mut segments = token.rsplitn(2, '.');
        let (Some(signature), Some(message)) = (segments.next(), segments.next()) else {
            return Err(AuthError::Malformed);
        };
        if message.matches('.').count() != 1 {
            return Err(AuthError::Malformed);
        }

        match crypto::verify(signature, message.as_bytes(), &self.decoding_key, self.algorithm) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(AuthError::SignatureInvalid),
        }
    }
}
