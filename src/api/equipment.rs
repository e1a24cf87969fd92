//! Equipment catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::equipment::{CreateEquipment, UpdateEquipment},
    models::{CatalogQuery, Equipment},
};

use super::AuthenticatedUser;

/// Catalog page response
#[derive(Serialize, ToSchema)]
pub struct CatalogResponse {
    pub success: bool,
    pub packages: Vec<Equipment>,
    /// Whether more results exist past this page
    pub has_more: bool,
}

/// Single equipment response
#[derive(Serialize, ToSchema)]
pub struct EquipmentResponse {
    pub success: bool,
    #[serde(rename = "packageData")]
    pub package_data: Equipment,
}

/// Created listing response
#[derive(Serialize, ToSchema)]
pub struct EquipmentCreatedResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "packageData")]
    pub package_data: Equipment,
}

/// Status message response
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// List catalog equipment with filtering, sorting and pagination
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Catalog page", body = CatalogResponse)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<CatalogResponse>> {
    let (packages, has_more) = state.services.catalog.list(query).await?;
    Ok(Json(CatalogResponse {
        success: true,
        packages,
        has_more,
    }))
}

/// Get a single equipment listing
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    params(
        ("id" = Uuid, Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentResponse),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EquipmentResponse>> {
    let package_data = state.services.catalog.get(id).await?;
    Ok(Json(EquipmentResponse {
        success: true,
        package_data,
    }))
}

/// Create an equipment listing
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Listing created", body = EquipmentCreatedResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Not allowed to list equipment")
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<EquipmentCreatedResponse>)> {
    claims.require_lister()?;

    // only admins may create listings on behalf of another owner
    let owner_id = match request.owner_id {
        Some(owner) if owner != claims.user_id => {
            claims.require_admin()?;
            owner
        }
        Some(owner) => owner,
        None => claims.user_id,
    };

    let package_data = state.services.catalog.create(owner_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(EquipmentCreatedResponse {
            success: true,
            message: "Equipment listing created".to_string(),
            package_data,
        }),
    ))
}

/// Update an equipment listing
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Equipment ID")
    ),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Listing updated", body = EquipmentResponse),
        (status = 403, description = "Not the listing owner"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEquipment>,
) -> AppResult<Json<EquipmentResponse>> {
    let package_data = state
        .services
        .catalog
        .update(id, claims.user_id, claims.is_admin(), request)
        .await?;
    Ok(Json(EquipmentResponse {
        success: true,
        package_data,
    }))
}

/// Archive an equipment listing
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, description = "Listing archived", body = MessageResponse),
        (status = 403, description = "Not the listing owner"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .catalog
        .archive(id, claims.user_id, claims.is_admin())
        .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Equipment listing archived".to_string(),
    }))
}
