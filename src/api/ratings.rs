//! Rating endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::rating::SubmitRating,
    models::Rating,
};

use super::AuthenticatedUser;

/// Status message response
#[derive(Serialize, ToSchema)]
pub struct RatingActionResponse {
    pub success: bool,
    pub message: String,
}

/// Whether a user has rated an equipment item
#[derive(Serialize, ToSchema)]
pub struct RatingGivenResponse {
    pub given: bool,
}

/// Submit a rating for an equipment item
#[utoipa::path(
    post,
    path = "/ratings",
    tag = "ratings",
    security(("bearer_auth" = [])),
    request_body = SubmitRating,
    responses(
        (status = 201, description = "Rating recorded", body = RatingActionResponse),
        (status = 400, description = "Invalid score or empty submission"),
        (status = 404, description = "User or equipment not found"),
        (status = 409, description = "Already rated by this user")
    )
)]
pub async fn submit_rating(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<SubmitRating>,
) -> AppResult<(StatusCode, Json<RatingActionResponse>)> {
    claims.require_self_or_admin(request.user_id)?;

    state.services.ratings.submit(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(RatingActionResponse {
            success: true,
            message: "Rating recorded".to_string(),
        }),
    ))
}

/// List the newest ratings for an equipment item
#[utoipa::path(
    get,
    path = "/ratings/{equipment_id}/{limit}",
    tag = "ratings",
    params(
        ("equipment_id" = Uuid, Path, description = "Equipment ID"),
        ("limit" = i64, Path, description = "Maximum number of ratings to return")
    ),
    responses(
        (status = 200, description = "Newest ratings first", body = Vec<Rating>),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn list_ratings(
    State(state): State<crate::AppState>,
    Path((equipment_id, limit)): Path<(Uuid, i64)>,
) -> AppResult<Json<Vec<Rating>>> {
    let ratings = state.services.ratings.list(equipment_id, limit).await?;
    Ok(Json(ratings))
}

/// Check whether a user has already rated an equipment item
#[utoipa::path(
    get,
    path = "/ratings/given/{user_id}/{equipment_id}",
    tag = "ratings",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("equipment_id" = Uuid, Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, description = "Rating presence flag", body = RatingGivenResponse)
    )
)]
pub async fn rating_given(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((user_id, equipment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<RatingGivenResponse>> {
    claims.require_self_or_admin(user_id)?;

    let rating = state.services.ratings.given(user_id, equipment_id).await?;
    Ok(Json(RatingGivenResponse {
        given: rating.is_some(),
    }))
}
