//! Booking endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::booking::CreateBooking,
    models::{Booking, BookingDetails},
};

use super::AuthenticatedUser;

/// Status message response
#[derive(Serialize, ToSchema)]
pub struct BookingActionResponse {
    pub success: bool,
    pub message: String,
}

/// Created booking response
#[derive(Serialize, ToSchema)]
pub struct BookingCreatedResponse {
    pub success: bool,
    pub message: String,
    pub booking: Booking,
}

/// Booking listing response
#[derive(Serialize, ToSchema)]
pub struct BookingListResponse {
    pub success: bool,
    pub bookings: Vec<BookingDetails>,
}

/// Booking listing query parameters
#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    /// Restrict to bookings made by this user; admins may omit it to list all
    pub user_id: Option<Uuid>,
    /// Substring filter on the renter's username or email
    pub search_term: Option<String>,
}

/// Booking request listing query parameters
#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestsQuery {
    /// Owner whose equipment the bookings were placed against
    pub owner_id: Uuid,
}

/// Create a booking, reserving the requested units
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking confirmed", body = BookingCreatedResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "User or equipment not found"),
        (status = 409, description = "Not enough units available")
    )
)]
pub async fn create_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<BookingCreatedResponse>)> {
    claims.require_self_or_admin(request.user_id)?;

    let booking = state.services.bookings.create_booking(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            success: true,
            message: "Booking confirmed".to_string(),
            booking,
        }),
    ))
}

/// Cancel a booking and release its units
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel/{user_id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        ("user_id" = Uuid, Path, description = "User requesting the cancellation")
    ),
    responses(
        (status = 200, description = "Booking cancelled", body = BookingActionResponse),
        (status = 403, description = "Not the renter or equipment owner"),
        (status = 404, description = "Booking not found"),
        (status = 422, description = "Already cancelled or completed")
    )
)]
pub async fn cancel_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((booking_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<BookingActionResponse>> {
    claims.require_self_or_admin(user_id)?;

    state
        .services
        .bookings
        .cancel_booking(booking_id, user_id, claims.is_admin())
        .await?;
    Ok(Json(BookingActionResponse {
        success: true,
        message: "Booking cancelled".to_string(),
    }))
}

/// List bookings made by a user
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(BookingsQuery),
    responses(
        (status = 200, description = "Bookings with joined equipment and renter", body = BookingListResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookingsQuery>,
) -> AppResult<Json<BookingListResponse>> {
    match query.user_id {
        Some(user_id) => claims.require_self_or_admin(user_id)?,
        None => claims.require_admin()?,
    }

    let bookings = state
        .services
        .bookings
        .list_for_user(query.user_id, query.search_term.as_deref())
        .await?;
    Ok(Json(BookingListResponse {
        success: true,
        bookings,
    }))
}

/// List bookings placed against an owner's equipment
#[utoipa::path(
    get,
    path = "/booking-requests",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(BookingRequestsQuery),
    responses(
        (status = 200, description = "Bookings against the owner's equipment", body = BookingListResponse),
        (status = 404, description = "Owner not found")
    )
)]
pub async fn list_booking_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookingRequestsQuery>,
) -> AppResult<Json<BookingListResponse>> {
    claims.require_self_or_admin(query.owner_id)?;

    let bookings = state
        .services
        .bookings
        .list_requests_for_owner(query.owner_id)
        .await?;
    Ok(Json(BookingListResponse {
        success: true,
        bookings,
    }))
}
