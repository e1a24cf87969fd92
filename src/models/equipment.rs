//! Equipment (catalog entry) model and catalog query types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Equipment record. `available_quantity` is mutated only by the inventory
/// ledger; `rating_mean`/`rating_count` only by the rating aggregator.
///
/// Invariants: `0 <= available_quantity <= total_quantity` and
/// `is_available == (available_quantity > 0 && archived_at.is_none())`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model_year: Option<i32>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub rental_terms: Option<String>,
    pub daily_rent_price: Decimal,
    /// Zero means no weekly rate is offered
    pub weekly_rent_price: Decimal,
    /// Zero means no monthly rate is offered
    pub monthly_rent_price: Decimal,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub is_available: bool,
    /// Image URLs, owned by external storage and treated as opaque strings
    pub images: Vec<String>,
    pub rating_mean: f64,
    pub rating_count: i64,
    /// Confirmed bookings ever created; never decremented on cancel
    pub total_rentals: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Equipment {
    /// Whether the weekly rate undercuts seven days at the daily rate
    pub fn is_discounted(&self) -> bool {
        self.weekly_rent_price > Decimal::ZERO
            && self.weekly_rent_price < self.daily_rent_price * Decimal::from(7)
    }
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model_year: Option<i32>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub rental_terms: Option<String>,
    pub daily_rent_price: Decimal,
    pub weekly_rent_price: Option<Decimal>,
    pub monthly_rent_price: Option<Decimal>,
    #[validate(range(min = 1, message = "Total quantity must be at least 1"))]
    pub total_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
    /// Listing owner; defaults to the authenticated caller. Only admins may
    /// create listings for another owner.
    pub owner_id: Option<Uuid>,
}

/// Update equipment request. Absent fields are left untouched. Changing
/// `total_quantity` shifts `available_quantity` by the same delta, clamped
/// to `[0, new_total]`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEquipment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub equipment_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model_year: Option<i32>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub rental_terms: Option<String>,
    pub daily_rent_price: Option<Decimal>,
    pub weekly_rent_price: Option<Decimal>,
    pub monthly_rent_price: Option<Decimal>,
    pub total_quantity: Option<i32>,
    pub images: Option<Vec<String>>,
}

/// Catalog sort keys, named as the consuming client sends them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SortField {
    #[serde(rename = "dailyRentPrice")]
    DailyRentPrice,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "ratingMean", alias = "packageRating")]
    RatingMean,
    #[serde(rename = "totalRentals")]
    TotalRentals,
}

impl SortField {
    /// Column name for SQL ORDER BY (whitelisted, never interpolated from input)
    pub fn column(&self) -> &'static str {
        match self {
            SortField::DailyRentPrice => "daily_rent_price",
            SortField::CreatedAt => "created_at",
            SortField::RatingMean => "rating_mean",
            SortField::TotalRentals => "total_rentals",
        }
    }
}

impl Default for SortField {
    fn default() -> Self {
        SortField::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Catalog listing query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogQuery {
    /// Case-insensitive substring match on name/description
    pub search_term: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    /// Restrict to listings whose weekly rate undercuts 7x the daily rate
    pub offer: Option<bool>,
    pub start_index: Option<i64>,
    pub limit: Option<i64>,
}

/// Catalog query with pagination defaults already applied
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub search_term: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub offer: bool,
    pub start_index: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment_with_prices(daily: i64, weekly: i64) -> Equipment {
        Equipment {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "tractor".to_string(),
            description: String::new(),
            equipment_type: None,
            manufacturer: None,
            model_year: None,
            condition: None,
            location: None,
            rental_terms: None,
            daily_rent_price: Decimal::from(daily),
            weekly_rent_price: Decimal::from(weekly),
            monthly_rent_price: Decimal::ZERO,
            total_quantity: 1,
            available_quantity: 1,
            is_available: true,
            images: vec![],
            rating_mean: 0.0,
            rating_count: 0,
            total_rentals: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived_at: None,
        }
    }

    #[test]
    fn weekly_rate_below_seven_dailies_is_an_offer() {
        assert!(equipment_with_prices(100, 600).is_discounted());
    }

    #[test]
    fn missing_or_full_price_weekly_rate_is_not_an_offer() {
        assert!(!equipment_with_prices(100, 0).is_discounted());
        assert!(!equipment_with_prices(100, 700).is_discounted());
    }

    #[test]
    fn sort_field_accepts_legacy_package_rating_alias() {
        let parsed: SortField = serde_json::from_str("\"packageRating\"").unwrap();
        assert_eq!(parsed, SortField::RatingMean);
    }
}
