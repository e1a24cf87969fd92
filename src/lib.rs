//! AgriRent Booking Engine
//!
//! A Rust implementation of the AgriRent equipment-rental marketplace
//! backend, providing a REST JSON API for catalog browsing, booking and
//! inventory accounting, and rating aggregation.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
