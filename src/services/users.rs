//! User provisioning service

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::user::CreateUser;
use crate::models::User;
use crate::store::EngineStore;

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn EngineStore>,
}

impl UsersService {
    pub fn new(store: Arc<dyn EngineStore>) -> Self {
        Self { store }
    }

    /// Provision a user record. Identity and credentials live with the
    /// external auth collaborator; this only mirrors the profile data the
    /// engine joins into bookings and ratings.
    pub async fn create(&self, input: CreateUser) -> AppResult<User> {
        input.validate()?;
        self.store.insert_user(&input).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}
