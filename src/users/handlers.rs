// HTTP handlers for user and admin endpoints
//
// Every route here sits behind `RequireRole`; the allowed sets are chosen in
// `create_router`.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{UpdateRoleRequest, UpdateStatusRequest, UserResponse},
};
use crate::AppState;

/// Get current user information
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Account inactive")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn me_handler(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Look up any account (moderators and admins)
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth.get_user(user_id).await?;
    Ok(Json(user))
}

/// Change an account's role (admins only)
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_role_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    tracing::info!("Admin user_id={} setting role of user_id={} to {}", admin.id, user_id, request.role);
    let user = state.auth.update_role(user_id, request.role).await?;
    Ok(Json(user))
}

/// Activate or deactivate an account (admins only)
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/status",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UserResponse),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_status_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    tracing::info!("Admin user_id={} setting is_active={} for user_id={}", admin.id, request.is_active, user_id);
    let user = state.auth.set_active(user_id, request.is_active).await?;
    Ok(Json(user))
}
