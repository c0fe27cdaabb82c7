// Account endpoints: the caller's own profile and admin account management

pub mod handlers;

pub use handlers::*;
