use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::{
    entities::warehouse::WarehouseKind,
    errors::ServiceError,
    services::topology::{NewLocation, NewWarehouse},
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateWarehouseRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub kind: WarehouseKind,
    #[validate(length(min = 1))]
    pub address: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub aisle: Option<String>,
    pub shelf: Option<String>,
    pub bin: Option<String>,
    pub capacity: Option<Decimal>,
    pub notes: Option<String>,
}

/// Create a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/warehouses",
    request_body = CreateWarehouseRequest,
    responses(
        (status = 201, description = "Warehouse created", body = serde_json::Value),
        (status = 400, description = "Duplicate code", body = crate::errors::ErrorResponse)
    ),
    tag = "topology"
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateWarehouseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let warehouse = state
        .services
        .topology
        .create_warehouse(
            ctx,
            NewWarehouse {
                name: payload.name,
                code: payload.code,
                kind: payload.kind,
                address: payload.address,
                contact_person: payload.contact_person,
                contact_phone: payload.contact_phone,
                contact_email: payload.contact_email,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response(warehouse))
}

/// List warehouses
#[utoipa::path(
    get,
    path = "/api/v1/warehouses",
    responses(
        (status = 200, description = "Warehouses", body = serde_json::Value)
    ),
    tag = "topology"
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouses = state.services.topology.list_warehouses(ctx).await?;
    Ok(success_response(warehouses))
}

/// Fetch one warehouse
#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}",
    responses(
        (status = 200, description = "Warehouse", body = serde_json::Value),
        (status = 404, description = "Unknown warehouse", body = crate::errors::ErrorResponse)
    ),
    tag = "topology"
)]
pub async fn get_warehouse(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.topology.get_warehouse(ctx, id).await?;
    Ok(success_response(warehouse))
}

/// Add a location to a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/warehouses/{id}/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = serde_json::Value),
        (status = 404, description = "Unknown warehouse", body = crate::errors::ErrorResponse)
    ),
    tag = "topology"
)]
pub async fn create_location(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let location = state
        .services
        .topology
        .create_location(
            ctx,
            id,
            NewLocation {
                name: payload.name,
                code: payload.code,
                aisle: payload.aisle,
                shelf: payload.shelf,
                bin: payload.bin,
                capacity: payload.capacity,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response(location))
}

/// List a warehouse's locations
#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}/locations",
    responses(
        (status = 200, description = "Locations", body = serde_json::Value)
    ),
    tag = "topology"
)]
pub async fn list_locations(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let locations = state.services.topology.list_locations(ctx, id).await?;
    Ok(success_response(locations))
}

pub fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/warehouses/:id", get(get_warehouse))
        .route(
            "/warehouses/:id/locations",
            get(list_locations).post(create_location),
        )
}
