//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{bookings, equipment, health, ratings, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AgriRent API",
        version = "1.0.0",
        description = "Equipment rental marketplace booking and inventory engine REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        // Bookings
        bookings::create_booking,
        bookings::cancel_booking,
        bookings::list_bookings,
        bookings::list_booking_requests,
        // Ratings
        ratings::submit_rating,
        ratings::list_ratings,
        ratings::rating_given,
        // Users
        users::create_user,
        users::get_user,
    ),
    components(
        schemas(
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::SortField,
            crate::models::equipment::SortOrder,
            equipment::CatalogResponse,
            equipment::EquipmentResponse,
            equipment::EquipmentCreatedResponse,
            equipment::MessageResponse,
            // Bookings
            crate::models::booking::Booking,
            crate::models::booking::BookingStatus,
            crate::models::booking::CreateBooking,
            crate::models::booking::BookingDetails,
            crate::models::booking::EquipmentShort,
            bookings::BookingActionResponse,
            bookings::BookingCreatedResponse,
            bookings::BookingListResponse,
            // Ratings
            crate::models::rating::Rating,
            crate::models::rating::SubmitRating,
            ratings::RatingActionResponse,
            ratings::RatingGivenResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::UserRole,
            crate::models::user::CreateUser,
            users::UserResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Catalog equipment management"),
        (name = "bookings", description = "Booking lifecycle"),
        (name = "ratings", description = "Equipment ratings and reviews"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
