//! Rating submission and listing service

use std::sync::Arc;

use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};
use crate::models::rating::{NewRating, SubmitRating};
use crate::models::Rating;
use crate::store::EngineStore;

#[derive(Clone)]
pub struct RatingsService {
    store: Arc<dyn EngineStore>,
    pagination: PaginationConfig,
}

impl RatingsService {
    pub fn new(store: Arc<dyn EngineStore>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Submit a rating. A score of zero with a non-empty review is stored as
    /// review-only and leaves the numeric aggregate untouched. One rating
    /// per (equipment, user) pair, enforced atomically by the store.
    pub async fn submit(&self, input: SubmitRating) -> AppResult<Rating> {
        let review = input.review.trim();
        if input.score == 0.0 && review.is_empty() {
            return Err(AppError::Validation(
                "Rating must include a score or a review".to_string(),
            ));
        }
        if input.score != 0.0 && !(1.0..=5.0).contains(&input.score) {
            return Err(AppError::Validation(
                "Score must be between 1 and 5".to_string(),
            ));
        }

        self.store
            .get_user(input.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", input.user_id)))?;
        self.store
            .get_equipment(input.equipment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Equipment {} not found", input.equipment_id))
            })?;

        self.store
            .insert_rating(&NewRating {
                equipment_id: input.equipment_id,
                user_id: input.user_id,
                score: input.score,
                review: (!review.is_empty()).then(|| review.to_string()),
            })
            .await
    }

    /// Newest ratings for an equipment item, `limit` clamped to the
    /// configured maximum
    pub async fn list(&self, equipment_id: Uuid, limit: i64) -> AppResult<Vec<Rating>> {
        self.store
            .get_equipment(equipment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment_id)))?;

        let limit = limit.clamp(1, self.pagination.max_limit);
        self.store.list_ratings(equipment_id, limit).await
    }

    /// The rating a user gave an equipment item, if any
    pub async fn given(&self, user_id: Uuid, equipment_id: Uuid) -> AppResult<Option<Rating>> {
        self.store.get_rating_by_user(equipment_id, user_id).await
    }
}
