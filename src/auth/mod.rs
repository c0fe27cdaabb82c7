// Authentication module
// Stateless JWT access/refresh tokens, Argon2 passwords and role-gated routes

pub mod authenticator;
pub mod clock;
pub mod codec;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod revocation;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Claims, TokenCodec, TokenKind};
pub use error::AuthError;
pub use gate::{AuthorizationGate, RoleCheck};
pub use handlers::{login_handler, logout_handler, refresh_handler, signup_handler};
pub use middleware::{AuthenticatedUser, RequireRole};
pub use models::{Role, RoleSet, TokenPair, User, UserResponse};
pub use password::PasswordService;
pub use repository::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};
pub use revocation::{InMemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use service::AuthService;
pub use token::TokenService;
