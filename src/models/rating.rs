//! Rating model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A user's rating of an equipment item. At most one per (user, equipment);
/// immutable once created. A score of zero marks a review-only submission
/// that does not contribute to the numeric aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rating {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    /// 1.0-5.0 (fractional allowed), or 0.0 when unset
    pub score: f64,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    /// Whether this rating carries a numeric score that feeds the aggregate
    pub fn has_score(&self) -> bool {
        self.score > 0.0
    }
}

/// Validated parameters for inserting a rating
#[derive(Debug, Clone)]
pub struct NewRating {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub score: f64,
    pub review: Option<String>,
}

/// Submit rating request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRating {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    /// 1-5, fractional allowed; 0 or absent for a review-only submission
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub review: String,
}
