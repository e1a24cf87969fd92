//! Booking lifecycle service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::booking::{CreateBooking, NewBooking};
use crate::models::{Booking, BookingDetails};
use crate::store::EngineStore;

#[derive(Clone)]
pub struct BookingsService {
    store: Arc<dyn EngineStore>,
}

impl BookingsService {
    pub fn new(store: Arc<dyn EngineStore>) -> Self {
        Self { store }
    }

    /// Create a booking, reserving its units. The reserve and the persisted
    /// record are one atomic unit in the store, so a failed reserve leaves
    /// no trace.
    pub async fn create_booking(&self, input: CreateBooking) -> AppResult<Booking> {
        input.validate()?;
        if input.end_date <= input.start_date {
            return Err(AppError::Validation(
                "End date must be after start date".to_string(),
            ));
        }

        self.store
            .get_user(input.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", input.user_id)))?;

        self.store
            .create_booking(&NewBooking {
                equipment_id: input.equipment_id,
                user_id: input.user_id,
                quantity: input.quantity,
                start_date: input.start_date,
                end_date: input.end_date,
            })
            .await
    }

    /// Cancel a confirmed booking and release its units. Allowed for the
    /// renter, the equipment owner, and admins.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
        is_admin: bool,
    ) -> AppResult<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !is_admin && booking.user_id != requester_id {
            let owns_equipment = self
                .store
                .get_equipment(booking.equipment_id)
                .await?
                .map_or(false, |e| e.owner_id == requester_id);
            if !owns_equipment {
                return Err(AppError::Forbidden(
                    "Only the renter or the equipment owner can cancel a booking".to_string(),
                ));
            }
        }

        if booking.is_completed(Utc::now()) {
            return Err(AppError::BusinessRule(
                "Cannot cancel a booking whose rental period has ended".to_string(),
            ));
        }

        self.store
            .cancel_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::BusinessRule("Booking is already cancelled".to_string()))
    }

    /// Bookings made by a user, optionally filtered by the renter's
    /// username or email. `user_id` of `None` lists all confirmed bookings
    /// (admin view).
    pub async fn list_for_user(
        &self,
        user_id: Option<Uuid>,
        search_term: Option<&str>,
    ) -> AppResult<Vec<BookingDetails>> {
        if let Some(id) = user_id {
            self.store
                .get_user(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        }
        self.store.list_bookings_for_user(user_id, search_term).await
    }

    /// Confirmed bookings placed against equipment owned by `owner_id`
    pub async fn list_requests_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<BookingDetails>> {
        self.store
            .get_user(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", owner_id)))?;
        self.store.list_booking_requests_for_owner(owner_id).await
    }
}
