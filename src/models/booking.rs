//! Booking model and state machine types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::UserShort;
use rust_decimal::Decimal;

/// Booking lifecycle states. The evidenced flow confirms immediately, so
/// `Requested` is the transient entry state of the machine; `Cancelled` is
/// terminal. A booking whose rental period has ended is treated as completed
/// (derived, not stored) and is terminal as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requested" => Ok(BookingStatus::Requested),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

// SQLx conversion for BookingStatus (stored as TEXT)
impl sqlx::Type<Postgres> for BookingStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BookingStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookingStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Booking record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Whether the rental period has ended (time-based terminal condition)
    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirmed && self.end_date < now
    }
}

/// Validated parameters for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Create booking request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBooking {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Short equipment representation joined into booking listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentShort {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub daily_rent_price: Decimal,
    pub images: Vec<String>,
}

/// Booking with joined equipment and user details for listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingDetails {
    pub id: Uuid,
    pub quantity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub equipment: EquipmentShort,
    pub user: UserShort,
}
