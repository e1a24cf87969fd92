//! Catalog query and listing management service

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};
use crate::models::equipment::{CreateEquipment, UpdateEquipment};
use crate::models::{CatalogPage, CatalogQuery, Equipment};
use crate::store::EngineStore;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn EngineStore>,
    pagination: PaginationConfig,
}

impl CatalogService {
    pub fn new(store: Arc<dyn EngineStore>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Run a catalog query. Returns the page and whether more rows exist
    /// past it.
    pub async fn list(&self, query: CatalogQuery) -> AppResult<(Vec<Equipment>, bool)> {
        let page = CatalogPage {
            search_term: query.search_term.filter(|t| !t.trim().is_empty()),
            sort: query.sort.unwrap_or_default(),
            order: query.order.unwrap_or_default(),
            offer: query.offer.unwrap_or(false),
            start_index: query.start_index.unwrap_or(0).max(0),
            limit: query
                .limit
                .unwrap_or(self.pagination.default_limit)
                .clamp(1, self.pagination.max_limit),
        };
        self.store.list_equipment(&page).await
    }

    /// Fetch a listing; archived equipment reads as absent
    pub async fn get(&self, id: Uuid) -> AppResult<Equipment> {
        self.store
            .get_equipment(id)
            .await?
            .filter(|e| e.archived_at.is_none())
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Create a listing owned by `owner_id`
    pub async fn create(&self, owner_id: Uuid, input: CreateEquipment) -> AppResult<Equipment> {
        input.validate()?;
        Self::check_prices(
            Some(input.daily_rent_price),
            input.weekly_rent_price,
            input.monthly_rent_price,
        )?;
        self.store.insert_equipment(owner_id, &input).await
    }

    /// Update a listing. Only the owner or an admin may touch it.
    pub async fn update(
        &self,
        id: Uuid,
        requester_id: Uuid,
        is_admin: bool,
        input: UpdateEquipment,
    ) -> AppResult<Equipment> {
        self.check_ownership(id, requester_id, is_admin).await?;
        if let Some(total) = input.total_quantity {
            if total < 1 {
                return Err(AppError::Validation(
                    "Total quantity must be at least 1".to_string(),
                ));
            }
        }
        Self::check_prices(
            input.daily_rent_price,
            input.weekly_rent_price,
            input.monthly_rent_price,
        )?;
        self.store.update_equipment(id, &input).await
    }

    /// Archive a listing. It drops out of the catalog and rejects new
    /// bookings; existing bookings keep resolving against it.
    pub async fn archive(&self, id: Uuid, requester_id: Uuid, is_admin: bool) -> AppResult<()> {
        self.check_ownership(id, requester_id, is_admin).await?;
        self.store.archive_equipment(id).await
    }

    async fn check_ownership(&self, id: Uuid, requester_id: Uuid, is_admin: bool) -> AppResult<()> {
        let equipment = self.get(id).await?;
        if !is_admin && equipment.owner_id != requester_id {
            return Err(AppError::Forbidden(
                "Only the listing owner can modify it".to_string(),
            ));
        }
        Ok(())
    }

    fn check_prices(
        daily: Option<Decimal>,
        weekly: Option<Decimal>,
        monthly: Option<Decimal>,
    ) -> AppResult<()> {
        if daily.map_or(false, |p| p <= Decimal::ZERO)
            || weekly.map_or(false, |p| p < Decimal::ZERO)
            || monthly.map_or(false, |p| p < Decimal::ZERO)
        {
            return Err(AppError::Validation(
                "Rent prices must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
