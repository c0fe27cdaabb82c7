// Bearer extraction and per-route role gating for axum

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::{error::AuthError, gate::AuthorizationGate, models::{RoleSet, User}};

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// A missing header yields `None`; a present but unusable header is an
/// authentication failure.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::Malformed)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Malformed)?;

    Ok(Some(token))
}

/// Authorization middleware that requires one of a set of roles
///
/// On success the resolved [`User`] is stored in request extensions for the
/// [`AuthenticatedUser`] extractor.
#[derive(Clone)]
pub struct RequireRole {
    gate: Arc<AuthorizationGate>,
    allowed: RoleSet,
}

impl RequireRole {
    pub fn new(gate: Arc<AuthorizationGate>, allowed: RoleSet) -> Self {
        Self { gate, allowed }
    }

    /// Middleware function that validates role-based access
    pub async fn middleware(self, mut request: Request<Body>, next: Next) -> Result<Response, AuthError> {
        let endpoint = request.uri().path().to_string();

        let user = {
            let token = bearer_token(request.headers())?;
            self.gate.require(token, &self.allowed).await
        }
        .map_err(|e| {
            warn!("Access denied to {}: {}", endpoint, e);
            e
        })?;

        debug!("user_id={} admitted to {}", user.id, endpoint);
        request.extensions_mut().insert(user);
        Ok(next.run(request).await)
    }
}

/// User admitted by [`RequireRole`] for the current request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AuthError::Unauthenticated)
    }
}
