//! User endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::AppResult, models::user::CreateUser, models::User};

use super::AuthenticatedUser;

/// Single user response
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

/// Provision a user record (admin only)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Administrator privileges required"),
        (status = 409, description = "Username or email already registered")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    claims.require_admin()?;

    let user = state.services.users.create(request).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { success: true, user })))
}

/// Get a user profile
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    claims.require_self_or_admin(id)?;

    let user = state.services.users.get(id).await?;
    Ok(Json(UserResponse { success: true, user }))
}
