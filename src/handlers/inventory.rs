use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{success_response, validate_input, PaginatedResponse};
use crate::{
    entities::stock_movement::MovementType,
    errors::ServiceError,
    services::{
        adjustments::AdjustmentRequest,
        ledger::{LevelFilter, MovementFilter},
    },
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct LevelQuery {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub batch: Option<String>,
    #[serde(default = "one")]
    pub page: u64,
    #[serde(default = "twenty")]
    pub per_page: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    #[serde(default = "one")]
    pub page: u64,
    #[serde(default = "twenty")]
    pub per_page: u64,
}

fn one() -> u64 {
    1
}
fn twenty() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[serde(default)]
    pub batch: String,
    /// Positive adds stock, negative removes it
    pub delta: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub location_id: Uuid,
    pub batch: String,
    pub quantity: Decimal,
    pub min_stock: Decimal,
}

/// List current stock balances
#[utoipa::path(
    get,
    path = "/api/v1/inventory/levels",
    params(LevelQuery),
    responses(
        (status = 200, description = "Balance rows", body = serde_json::Value)
    ),
    tag = "inventory"
)]
pub async fn list_levels(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<LevelQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let filter = LevelFilter {
        product_id: query.product_id,
        location_id: query.location_id,
        batch: query.batch,
    };

    let (levels, total) = state
        .services
        .ledger
        .list_levels(ctx, filter, query.page, query.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        levels,
        query.page,
        query.per_page,
        total,
    )))
}

/// List ledger entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    params(MovementQuery),
    responses(
        (status = 200, description = "Movement history", body = serde_json::Value)
    ),
    tag = "inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let filter = MovementFilter {
        product_id: query.product_id,
        location_id: query.location_id,
        movement_type: query.movement_type,
    };

    let (movements, total) = state
        .services
        .ledger
        .list_movements(ctx, filter, query.page, query.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        movements,
        query.page,
        query.per_page,
        total,
    )))
}

/// Balance rows below their product's minimum stock threshold
#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses(
        (status = 200, description = "Low stock rows", body = [LowStockEntry])
    ),
    tag = "inventory"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.services.ledger.low_stock(ctx).await?;

    let entries: Vec<LowStockEntry> = rows
        .into_iter()
        .map(|(level, product)| LowStockEntry {
            product_id: product.id,
            sku: product.sku,
            product_name: product.name,
            location_id: level.location_id,
            batch: level.batch,
            quantity: level.quantity,
            min_stock: product.min_stock,
        })
        .collect();

    Ok(success_response(entries))
}

/// Reconcile one balance row against its movement history
#[utoipa::path(
    get,
    path = "/api/v1/inventory/levels/{id}/audit",
    params(("id" = Uuid, Path, description = "Balance row id")),
    responses(
        (status = 200, description = "Replay result", body = crate::services::ledger::LedgerAudit),
        (status = 404, description = "Unknown balance row", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn audit_level(
    State(state): State<AppState>,
    _ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let audit = state.services.ledger.audit_level(id).await?;
    Ok(success_response(audit))
}

/// Manually correct one balance row
#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjustments",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Adjustment movement", body = serde_json::Value),
        (status = 422, description = "Zero delta or insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let movement = state
        .services
        .adjustments
        .adjust(
            ctx,
            AdjustmentRequest {
                product_id: payload.product_id,
                location_id: payload.location_id,
                batch: payload.batch,
                delta: payload.delta,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(success_response(movement))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/levels", get(list_levels))
        .route("/inventory/levels/:id/audit", get(audit_level))
        .route("/inventory/movements", get(list_movements))
        .route("/inventory/low-stock", get(low_stock))
        .route("/inventory/adjustments", post(adjust_stock))
}
