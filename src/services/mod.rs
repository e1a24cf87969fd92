//! Business logic services

pub mod bookings;
pub mod catalog;
pub mod ratings;
pub mod users;

use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::store::EngineStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub bookings: bookings::BookingsService,
    pub catalog: catalog::CatalogService,
    pub ratings: ratings::RatingsService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services on top of the given store backend
    pub fn new(store: Arc<dyn EngineStore>, pagination: PaginationConfig) -> Self {
        Self {
            bookings: bookings::BookingsService::new(store.clone()),
            catalog: catalog::CatalogService::new(store.clone(), pagination.clone()),
            ratings: ratings::RatingsService::new(store.clone(), pagination),
            users: users::UsersService::new(store),
        }
    }
}
