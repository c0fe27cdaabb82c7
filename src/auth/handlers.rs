// HTTP handlers for authentication endpoints

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use validator::Validate;

use crate::auth::{
    error::AuthError,
    middleware::{bearer_token, AuthenticatedUser},
    models::{LoginRequest, RefreshRequest, SignupRequest, TokenPair, UserResponse},
};
use crate::AppState;

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    request.validate()?;
    let user = state.auth.signup(&request.email, &request.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Login a user
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPair),
        (status = 401, description = "Invalid email or password"),
        (status = 503, description = "User directory unavailable, retry later")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    // Malformed emails get the same answer as unknown ones
    if request.validate().is_err() {
        return Err(AuthError::InvalidCredentials);
    }
    let pair = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(pair))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenPair),
        (status = 401, description = "Refresh token rejected")
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

/// Revoke the caller's tokens (protected endpoint)
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshRequest,
    responses(
        (status = 204, description = "Tokens revoked"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<StatusCode, AuthError> {
    let access_token = bearer_token(&headers)?.ok_or(AuthError::Unauthenticated)?;
    state.auth.logout(access_token, &request.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
