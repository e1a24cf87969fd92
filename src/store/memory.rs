//! In-memory store backend, intended for tests and local development.
//!
//! Availability lives in the shared [`InventoryLedger`]; each equipment
//! entry carries its own mutex so rating submissions against the same
//! listing serialize without blocking the rest of the store. Lock order is
//! always equipment entry before ledger, and no lock is held across an
//! await point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::booking::{EquipmentShort, NewBooking};
use crate::models::equipment::{CreateEquipment, UpdateEquipment};
use crate::models::rating::NewRating;
use crate::models::user::CreateUser;
use crate::models::{
    Booking, BookingDetails, BookingStatus, CatalogPage, Equipment, Rating, SortField, SortOrder,
    User, UserShort,
};

use super::{EngineStore, InventoryLedger};

#[derive(Debug)]
struct EquipmentEntry {
    record: Equipment,
    /// Newest first
    ratings: Vec<Rating>,
    raters: HashSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: InventoryLedger,
    users: RwLock<HashMap<Uuid, User>>,
    equipment: RwLock<HashMap<Uuid, Arc<Mutex<EquipmentEntry>>>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

fn poisoned() -> AppError {
    AppError::Internal("store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, equipment_id: Uuid) -> AppResult<Arc<Mutex<EquipmentEntry>>> {
        let equipment = self.equipment.read().map_err(|_| poisoned())?;
        equipment
            .get(&equipment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment_id)))
    }

    /// Clone the record with availability overlaid from the ledger
    fn materialize(&self, entry: &EquipmentEntry) -> AppResult<Equipment> {
        let mut record = entry.record.clone();
        record.available_quantity = self.ledger.query(record.id)?;
        record.is_available = record.available_quantity > 0 && record.archived_at.is_none();
        Ok(record)
    }

    fn equipment_short(record: &Equipment) -> EquipmentShort {
        EquipmentShort {
            id: record.id,
            owner_id: record.owner_id,
            name: record.name.clone(),
            location: record.location.clone(),
            daily_rent_price: record.daily_rent_price,
            images: record.images.clone(),
        }
    }

    fn booking_details(&self, booking: &Booking) -> AppResult<Option<BookingDetails>> {
        let entry = match self.entry(booking.equipment_id) {
            Ok(entry) => entry,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry = entry.lock().map_err(|_| poisoned())?;

        let users = self.users.read().map_err(|_| poisoned())?;
        let Some(user) = users.get(&booking.user_id) else {
            return Ok(None);
        };

        Ok(Some(BookingDetails {
            id: booking.id,
            quantity: booking.quantity,
            start_date: booking.start_date,
            end_date: booking.end_date,
            status: booking.status,
            created_at: booking.created_at,
            equipment: Self::equipment_short(&entry.record),
            user: UserShort::from(user),
        }))
    }

    fn collect_details<F>(&self, filter: F) -> AppResult<Vec<BookingDetails>>
    where
        F: Fn(&Booking) -> bool,
    {
        let bookings: Vec<Booking> = {
            let map = self.bookings.read().map_err(|_| poisoned())?;
            map.values().filter(|b| filter(b)).cloned().collect()
        };

        let mut details = Vec::with_capacity(bookings.len());
        for booking in &bookings {
            if let Some(d) = self.booking_details(booking)? {
                details.push(d);
            }
        }
        details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(details)
    }
}

#[async_trait]
impl EngineStore for MemoryStore {
    async fn insert_user(&self, input: &CreateUser) -> AppResult<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users
            .values()
            .any(|u| u.username == input.username || u.email == input.email)
        {
            return Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: input.username.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            avatar: input.avatar.clone(),
            role: input.role.unwrap_or_default(),
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn insert_equipment(
        &self,
        owner_id: Uuid,
        input: &CreateEquipment,
    ) -> AppResult<Equipment> {
        let now = Utc::now();
        let record = Equipment {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name.clone(),
            description: input.description.clone(),
            equipment_type: input.equipment_type.clone(),
            manufacturer: input.manufacturer.clone(),
            model_year: input.model_year,
            condition: input.condition.clone(),
            location: input.location.clone(),
            rental_terms: input.rental_terms.clone(),
            daily_rent_price: input.daily_rent_price,
            weekly_rent_price: input.weekly_rent_price.unwrap_or(Decimal::ZERO),
            monthly_rent_price: input.monthly_rent_price.unwrap_or(Decimal::ZERO),
            total_quantity: input.total_quantity,
            available_quantity: input.total_quantity,
            is_available: true,
            images: input.images.clone(),
            rating_mean: 0.0,
            rating_count: 0,
            total_rentals: 0,
            created_at: now,
            updated_at: now,
            archived_at: None,
        };

        self.ledger.register(record.id, record.total_quantity)?;
        let mut equipment = self.equipment.write().map_err(|_| poisoned())?;
        equipment.insert(
            record.id,
            Arc::new(Mutex::new(EquipmentEntry {
                record: record.clone(),
                ratings: Vec::new(),
                raters: HashSet::new(),
            })),
        );
        Ok(record)
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry = entry.lock().map_err(|_| poisoned())?;
        Ok(Some(self.materialize(&entry)?))
    }

    async fn update_equipment(&self, id: Uuid, input: &UpdateEquipment) -> AppResult<Equipment> {
        let entry = self.entry(id)?;
        let mut entry = entry.lock().map_err(|_| poisoned())?;

        let record = &mut entry.record;
        if let Some(v) = &input.name {
            record.name = v.clone();
        }
        if let Some(v) = &input.description {
            record.description = v.clone();
        }
        if let Some(v) = &input.equipment_type {
            record.equipment_type = Some(v.clone());
        }
        if let Some(v) = &input.manufacturer {
            record.manufacturer = Some(v.clone());
        }
        if let Some(v) = input.model_year {
            record.model_year = Some(v);
        }
        if let Some(v) = &input.condition {
            record.condition = Some(v.clone());
        }
        if let Some(v) = &input.location {
            record.location = Some(v.clone());
        }
        if let Some(v) = &input.rental_terms {
            record.rental_terms = Some(v.clone());
        }
        if let Some(v) = input.daily_rent_price {
            record.daily_rent_price = v;
        }
        if let Some(v) = input.weekly_rent_price {
            record.weekly_rent_price = v;
        }
        if let Some(v) = input.monthly_rent_price {
            record.monthly_rent_price = v;
        }
        if let Some(v) = &input.images {
            record.images = v.clone();
        }
        if let Some(new_total) = input.total_quantity {
            self.ledger.resize(id, new_total)?;
            record.total_quantity = new_total;
        }
        record.updated_at = Utc::now();

        self.materialize(&entry)
    }

    async fn archive_equipment(&self, id: Uuid) -> AppResult<()> {
        let entry = self.entry(id)?;
        let mut entry = entry.lock().map_err(|_| poisoned())?;
        entry.record.archived_at = Some(Utc::now());
        entry.record.updated_at = Utc::now();
        Ok(())
    }

    async fn list_equipment(&self, page: &CatalogPage) -> AppResult<(Vec<Equipment>, bool)> {
        let entries: Vec<Arc<Mutex<EquipmentEntry>>> = {
            let equipment = self.equipment.read().map_err(|_| poisoned())?;
            equipment.values().cloned().collect()
        };

        let mut rows = Vec::new();
        for entry in entries {
            let entry = entry.lock().map_err(|_| poisoned())?;
            if entry.record.archived_at.is_some() {
                continue;
            }
            rows.push(self.materialize(&entry)?);
        }

        if let Some(term) = page.search_term.as_deref().filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            rows.retain(|e| {
                e.name.to_lowercase().contains(&term)
                    || e.description.to_lowercase().contains(&term)
            });
        }
        if page.offer {
            rows.retain(Equipment::is_discounted);
        }

        rows.sort_by(|a, b| {
            let ordering = match page.sort {
                SortField::DailyRentPrice => a.daily_rent_price.cmp(&b.daily_rent_price),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::RatingMean => a
                    .rating_mean
                    .partial_cmp(&b.rating_mean)
                    .unwrap_or(std::cmp::Ordering::Equal),
                SortField::TotalRentals => a.total_rentals.cmp(&b.total_rentals),
            };
            let ordering = match page.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            // deterministic paging across equal keys
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let start = page.start_index.max(0) as usize;
        let limit = page.limit.max(0) as usize;
        let rows: Vec<Equipment> = rows.into_iter().skip(start).collect();
        let has_more = rows.len() > limit;
        Ok((rows.into_iter().take(limit).collect(), has_more))
    }

    async fn create_booking(&self, booking: &NewBooking) -> AppResult<Booking> {
        let entry = self.entry(booking.equipment_id)?;
        let token = {
            let mut entry = entry.lock().map_err(|_| poisoned())?;
            if entry.record.archived_at.is_some() {
                return Err(AppError::NotFound(format!(
                    "Equipment {} not found",
                    booking.equipment_id
                )));
            }
            let token = self.ledger.reserve(booking.equipment_id, booking.quantity)?;
            entry.record.total_rentals += 1;
            token
        };

        let now = Utc::now();
        let record = Booking {
            id: Uuid::new_v4(),
            equipment_id: token.equipment_id(),
            user_id: booking.user_id,
            quantity: token.quantity(),
            start_date: booking.start_date,
            end_date: booking.end_date,
            status: BookingStatus::Confirmed,
            created_at: now,
            confirmed_at: Some(now),
            cancelled_at: None,
        };

        let mut bookings = self.bookings.write().map_err(|_| poisoned())?;
        bookings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let bookings = self.bookings.read().map_err(|_| poisoned())?;
        Ok(bookings.get(&id).cloned())
    }

    async fn cancel_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let cancelled = {
            let mut bookings = self.bookings.write().map_err(|_| poisoned())?;
            let Some(booking) = bookings.get_mut(&id) else {
                return Err(AppError::NotFound(format!("Booking {} not found", id)));
            };
            if booking.status != BookingStatus::Confirmed {
                return Ok(None);
            }
            booking.status = BookingStatus::Cancelled;
            booking.cancelled_at = Some(Utc::now());
            booking.clone()
        };

        self.ledger
            .release_quantity(cancelled.equipment_id, cancelled.quantity)?;
        Ok(Some(cancelled))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Option<Uuid>,
        search_term: Option<&str>,
    ) -> AppResult<Vec<BookingDetails>> {
        // the all-bookings (admin) view shows only confirmed bookings
        let mut details = self.collect_details(|b| match user_id {
            Some(id) => b.user_id == id,
            None => b.status == BookingStatus::Confirmed,
        })?;
        if let Some(term) = search_term.filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            details.retain(|d| {
                d.user.username.to_lowercase().contains(&term)
                    || d.user.email.to_lowercase().contains(&term)
            });
        }
        Ok(details)
    }

    async fn list_booking_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> AppResult<Vec<BookingDetails>> {
        let owned: HashSet<Uuid> = {
            let equipment = self.equipment.read().map_err(|_| poisoned())?;
            let mut owned = HashSet::new();
            for entry in equipment.values() {
                let entry = entry.lock().map_err(|_| poisoned())?;
                if entry.record.owner_id == owner_id {
                    owned.insert(entry.record.id);
                }
            }
            owned
        };
        self.collect_details(|b| {
            b.status == BookingStatus::Confirmed && owned.contains(&b.equipment_id)
        })
    }

    async fn insert_rating(&self, rating: &NewRating) -> AppResult<Rating> {
        let entry = self.entry(rating.equipment_id)?;
        let mut entry = entry.lock().map_err(|_| poisoned())?;

        if entry.raters.contains(&rating.user_id) {
            return Err(AppError::DuplicateRating(
                "You have already rated this equipment".to_string(),
            ));
        }

        let record = Rating {
            id: Uuid::new_v4(),
            equipment_id: rating.equipment_id,
            user_id: rating.user_id,
            score: rating.score,
            review: rating.review.clone(),
            created_at: Utc::now(),
        };

        if record.has_score() {
            let equipment = &mut entry.record;
            let count = equipment.rating_count;
            equipment.rating_mean =
                (equipment.rating_mean * count as f64 + record.score) / (count + 1) as f64;
            equipment.rating_count = count + 1;
        }

        entry.raters.insert(record.user_id);
        entry.ratings.insert(0, record.clone());
        Ok(record)
    }

    async fn list_ratings(&self, equipment_id: Uuid, limit: i64) -> AppResult<Vec<Rating>> {
        let entry = self.entry(equipment_id)?;
        let entry = entry.lock().map_err(|_| poisoned())?;
        Ok(entry
            .ratings
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_rating_by_user(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Rating>> {
        let entry = match self.entry(equipment_id) {
            Ok(entry) => entry,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entry = entry.lock().map_err(|_| poisoned())?;
        Ok(entry
            .ratings
            .iter()
            .find(|r| r.user_id == user_id)
            .cloned())
    }
}
