//! Storage backends.
//!
//! [`EngineStore`] is the seam between the services and persistence. The
//! Postgres implementation backs the server; the in-memory implementation
//! backs the engine tests and local development without a database.
//!
//! Methods that combine an availability check with a write (booking
//! creation, cancellation, rating submission) are single trait calls so
//! each backend can make them atomic with its own means.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::booking::NewBooking;
use crate::models::equipment::{CreateEquipment, UpdateEquipment};
use crate::models::rating::NewRating;
use crate::models::user::CreateUser;
use crate::models::{Booking, BookingDetails, CatalogPage, Equipment, Rating, User};

pub mod ledger;
pub mod memory;
pub mod postgres;

pub use ledger::{InventoryLedger, ReservationToken};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait EngineStore: Send + Sync {
    // Users

    async fn insert_user(&self, user: &CreateUser) -> AppResult<User>;

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    // Equipment

    async fn insert_equipment(&self, owner_id: Uuid, input: &CreateEquipment)
        -> AppResult<Equipment>;

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>>;

    async fn update_equipment(&self, id: Uuid, input: &UpdateEquipment) -> AppResult<Equipment>;

    /// Soft delete. The listing drops out of the catalog and rejects new
    /// bookings, while existing bookings keep resolving against it.
    async fn archive_equipment(&self, id: Uuid) -> AppResult<()>;

    /// Filtered, sorted, paginated catalog page. The boolean is true when
    /// more rows exist past this page.
    async fn list_equipment(&self, page: &CatalogPage) -> AppResult<(Vec<Equipment>, bool)>;

    // Bookings

    /// Reserve `quantity` units and persist the booking as one atomic unit.
    /// Fails with `OutOfStock` (and no side effect) when availability is
    /// insufficient.
    async fn create_booking(&self, booking: &NewBooking) -> AppResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> AppResult<Option<Booking>>;

    /// Flip a confirmed booking to cancelled and release its units. Returns
    /// `None` when the booking was not in a cancellable state.
    async fn cancel_booking(&self, id: Uuid) -> AppResult<Option<Booking>>;

    /// Bookings made by a user, with joined equipment and renter details,
    /// newest first. When `user_id` is absent, all confirmed bookings are
    /// returned. The search term filters on the renter's username or email.
    async fn list_bookings_for_user(
        &self,
        user_id: Option<Uuid>,
        search_term: Option<&str>,
    ) -> AppResult<Vec<BookingDetails>>;

    /// Confirmed bookings placed against equipment owned by `owner_id`,
    /// newest first
    async fn list_booking_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> AppResult<Vec<BookingDetails>>;

    // Ratings

    /// Insert the rating and fold a scored one into the equipment aggregate
    /// as one atomic unit. Fails with `DuplicateRating` when the (equipment,
    /// user) pair already has one.
    async fn insert_rating(&self, rating: &NewRating) -> AppResult<Rating>;

    /// Newest ratings first, at most `limit`
    async fn list_ratings(&self, equipment_id: Uuid, limit: i64) -> AppResult<Vec<Rating>>;

    /// The rating a user gave an equipment item, if any
    async fn get_rating_by_user(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Rating>>;
}
