//! Postgres store backend.
//!
//! Availability checks and their writes run as single conditional UPDATE
//! statements inside transactions, so concurrent bookings against the same
//! equipment serialize on the row without any application-side locking.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::booking::{EquipmentShort, NewBooking};
use crate::models::equipment::{CreateEquipment, UpdateEquipment};
use crate::models::rating::NewRating;
use crate::models::user::CreateUser;
use crate::models::{
    Booking, BookingDetails, BookingStatus, CatalogPage, Equipment, Rating, User, UserShort,
};

use super::EngineStore;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
    max_retries: u32,
}

impl PostgresStore {
    pub fn new(pool: Pool<Postgres>, max_retries: u32) -> Self {
        Self { pool, max_retries }
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
    }

    fn is_serialization_failure(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        )
    }

    fn booking_details_from_row(row: &sqlx::postgres::PgRow) -> BookingDetails {
        BookingDetails {
            id: row.get("id"),
            quantity: row.get("quantity"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            status: row.get("status"),
            created_at: row.get("created_at"),
            equipment: EquipmentShort {
                id: row.get("equipment_id"),
                owner_id: row.get("equipment_owner_id"),
                name: row.get("equipment_name"),
                location: row.get("equipment_location"),
                daily_rent_price: row.get("equipment_daily_rent_price"),
                images: row.get("equipment_images"),
            },
            user: UserShort {
                id: row.get("user_id"),
                username: row.get("user_username"),
                email: row.get("user_email"),
                phone: row.get("user_phone"),
            },
        }
    }

    async fn try_insert_rating(&self, rating: &NewRating) -> AppResult<Rating> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (id, equipment_id, user_id, score, review, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT ON CONSTRAINT ratings_one_per_user DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rating.equipment_id)
        .bind(rating.user_id)
        .bind(rating.score)
        .bind(&rating.review)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            return Err(AppError::DuplicateRating(
                "You have already rated this equipment".to_string(),
            ));
        };

        if inserted.has_score() {
            sqlx::query(
                r#"
                UPDATE equipment
                SET rating_mean = (rating_mean * rating_count + $2) / (rating_count + 1),
                    rating_count = rating_count + 1,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(rating.equipment_id)
            .bind(inserted.score)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl EngineStore for PostgresStore {
    async fn insert_user(&self, input: &CreateUser) -> AppResult<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, phone, avatar, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.avatar)
        .bind(input.role.unwrap_or_default())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if Self::is_unique_violation(&e) => Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_equipment(
        &self,
        owner_id: Uuid,
        input: &CreateEquipment,
    ) -> AppResult<Equipment> {
        let equipment = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (
                id, owner_id, name, description, equipment_type, manufacturer,
                model_year, condition, location, rental_terms,
                daily_rent_price, weekly_rent_price, monthly_rent_price,
                total_quantity, available_quantity, is_available, images,
                rating_mean, rating_count, total_rentals,
                created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $14, TRUE, $15, 0, 0, 0, NOW(), NOW()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.equipment_type)
        .bind(&input.manufacturer)
        .bind(input.model_year)
        .bind(&input.condition)
        .bind(&input.location)
        .bind(&input.rental_terms)
        .bind(input.daily_rent_price)
        .bind(input.weekly_rent_price.unwrap_or(Decimal::ZERO))
        .bind(input.monthly_rent_price.unwrap_or(Decimal::ZERO))
        .bind(input.total_quantity)
        .bind(&input.images)
        .fetch_one(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        let equipment = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(equipment)
    }

    async fn update_equipment(&self, id: Uuid, input: &UpdateEquipment) -> AppResult<Equipment> {
        // Changing the total shifts availability by the same delta, clamped
        // to [0, new_total]. All right-hand references read the old row.
        let equipment = sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                equipment_type = COALESCE($4, equipment_type),
                manufacturer = COALESCE($5, manufacturer),
                model_year = COALESCE($6, model_year),
                condition = COALESCE($7, condition),
                location = COALESCE($8, location),
                rental_terms = COALESCE($9, rental_terms),
                daily_rent_price = COALESCE($10, daily_rent_price),
                weekly_rent_price = COALESCE($11, weekly_rent_price),
                monthly_rent_price = COALESCE($12, monthly_rent_price),
                images = COALESCE($13, images),
                total_quantity = COALESCE($14, total_quantity),
                available_quantity = GREATEST(0, LEAST(
                    COALESCE($14, total_quantity),
                    available_quantity + COALESCE($14, total_quantity) - total_quantity
                )),
                is_available = (archived_at IS NULL) AND GREATEST(0, LEAST(
                    COALESCE($14, total_quantity),
                    available_quantity + COALESCE($14, total_quantity) - total_quantity
                )) > 0,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.equipment_type)
        .bind(&input.manufacturer)
        .bind(input.model_year)
        .bind(&input.condition)
        .bind(&input.location)
        .bind(&input.rental_terms)
        .bind(input.daily_rent_price)
        .bind(input.weekly_rent_price)
        .bind(input.monthly_rent_price)
        .bind(&input.images)
        .bind(input.total_quantity)
        .fetch_optional(&self.pool)
        .await?;

        equipment.ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn archive_equipment(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE equipment
            SET archived_at = NOW(), is_available = FALSE, updated_at = NOW()
            WHERE id = $1 AND archived_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    async fn list_equipment(&self, page: &CatalogPage) -> AppResult<(Vec<Equipment>, bool)> {
        // sort column and direction come from whitelisted enums, never from
        // raw client input
        let query = format!(
            r#"
            SELECT * FROM equipment
            WHERE archived_at IS NULL
              AND ($1::text IS NULL
                   OR name ILIKE '%' || $1 || '%'
                   OR description ILIKE '%' || $1 || '%')
              AND (NOT $2 OR (weekly_rent_price > 0
                              AND weekly_rent_price < daily_rent_price * 7))
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            page.sort.column(),
            page.order.keyword(),
        );

        // fetch one row past the page to learn whether more exist
        let mut rows = sqlx::query_as::<_, Equipment>(&query)
            .bind(&page.search_term)
            .bind(page.offer)
            .bind(page.limit + 1)
            .bind(page.start_index)
            .fetch_all(&self.pool)
            .await?;

        let has_more = rows.len() as i64 > page.limit;
        rows.truncate(page.limit.max(0) as usize);
        Ok((rows, has_more))
    }

    async fn create_booking(&self, booking: &NewBooking) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // conditional decrement, a no-op when stock is short
        let reserved = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE equipment
            SET available_quantity = available_quantity - $2,
                is_available = (available_quantity - $2) > 0,
                total_rentals = total_rentals + 1,
                updated_at = NOW()
            WHERE id = $1 AND archived_at IS NULL AND available_quantity >= $2
            RETURNING available_quantity
            "#,
        )
        .bind(booking.equipment_id)
        .bind(booking.quantity)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            let available = sqlx::query_scalar::<_, Option<i32>>(
                "SELECT available_quantity FROM equipment WHERE id = $1 AND archived_at IS NULL",
            )
            .bind(booking.equipment_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten();

            return match available {
                Some(available) => Err(AppError::OutOfStock(format!(
                    "Requested {} units, only {} available",
                    booking.quantity, available
                ))),
                None => Err(AppError::NotFound(format!(
                    "Equipment {} not found",
                    booking.equipment_id
                ))),
            };
        }

        let created = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, equipment_id, user_id, quantity, start_date, end_date,
                status, created_at, confirmed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.equipment_id)
        .bind(booking.user_id)
        .bind(booking.quantity)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(BookingStatus::Confirmed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn cancel_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        // status guard makes the cancel idempotent under races
        let cancelled = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, cancelled_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(BookingStatus::Cancelled)
        .bind(BookingStatus::Confirmed)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(cancelled) = cancelled else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound(format!("Booking {} not found", id)));
            }
            return Ok(None);
        };

        // release the units, capped at the total
        sqlx::query(
            r#"
            UPDATE equipment
            SET available_quantity = LEAST(available_quantity + $2, total_quantity),
                is_available = (archived_at IS NULL)
                    AND LEAST(available_quantity + $2, total_quantity) > 0,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cancelled.equipment_id)
        .bind(cancelled.quantity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(cancelled))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Option<Uuid>,
        search_term: Option<&str>,
    ) -> AppResult<Vec<BookingDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.equipment_id, b.user_id, b.quantity,
                   b.start_date, b.end_date, b.status, b.created_at,
                   e.owner_id as equipment_owner_id, e.name as equipment_name,
                   e.location as equipment_location,
                   e.daily_rent_price as equipment_daily_rent_price,
                   e.images as equipment_images,
                   u.username as user_username, u.email as user_email,
                   u.phone as user_phone
            FROM bookings b
            JOIN equipment e ON b.equipment_id = e.id
            JOIN users u ON b.user_id = u.id
            WHERE ($1::uuid IS NULL OR b.user_id = $1)
              AND ($1::uuid IS NOT NULL OR b.status = 'confirmed')
              AND ($2::text IS NULL
                   OR u.username ILIKE '%' || $2 || '%'
                   OR u.email ILIKE '%' || $2 || '%')
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(search_term)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::booking_details_from_row).collect())
    }

    async fn list_booking_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> AppResult<Vec<BookingDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.equipment_id, b.user_id, b.quantity,
                   b.start_date, b.end_date, b.status, b.created_at,
                   e.owner_id as equipment_owner_id, e.name as equipment_name,
                   e.location as equipment_location,
                   e.daily_rent_price as equipment_daily_rent_price,
                   e.images as equipment_images,
                   u.username as user_username, u.email as user_email,
                   u.phone as user_phone
            FROM bookings b
            JOIN equipment e ON b.equipment_id = e.id
            JOIN users u ON b.user_id = u.id
            WHERE e.owner_id = $1 AND b.status = 'confirmed'
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::booking_details_from_row).collect())
    }

    async fn insert_rating(&self, rating: &NewRating) -> AppResult<Rating> {
        let mut attempt = 0;
        loop {
            match self.try_insert_rating(rating).await {
                Err(AppError::Database(e))
                    if Self::is_serialization_failure(&e) && attempt < self.max_retries =>
                {
                    attempt += 1;
                    tracing::debug!(attempt, "retrying rating submission after conflict");
                }
                Err(AppError::Database(e)) if Self::is_serialization_failure(&e) => {
                    return Err(AppError::Conflict(
                        "Rating submission conflicted, please retry".to_string(),
                    ));
                }
                other => return other,
            }
        }
    }

    async fn list_ratings(&self, equipment_id: Uuid, limit: i64) -> AppResult<Vec<Rating>> {
        let ratings = sqlx::query_as::<_, Rating>(
            r#"
            SELECT * FROM ratings
            WHERE equipment_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(equipment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    async fn get_rating_by_user(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Rating>> {
        let rating = sqlx::query_as::<_, Rating>(
            "SELECT * FROM ratings WHERE equipment_id = $1 AND user_id = $2",
        )
        .bind(equipment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }
}
