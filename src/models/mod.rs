//! Data models for AgriRent

pub mod booking;
pub mod equipment;
pub mod rating;
pub mod user;

// Re-export commonly used types
pub use booking::{Booking, BookingDetails, BookingStatus};
pub use equipment::{CatalogPage, CatalogQuery, Equipment, SortField, SortOrder};
pub use rating::Rating;
pub use user::{User, UserClaims, UserRole, UserShort};
