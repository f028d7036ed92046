use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input, PaginatedResponse};
use crate::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    services::{
        purchasing::{NewPurchaseOrder, NewPurchaseOrderItem},
        receiving::ReceiveLine,
    },
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    /// Destination location for received stock
    pub location_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceiveRequest {
    /// Omit to receive every outstanding item in full
    pub lines: Option<Vec<ReceiveLineRequest>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceiveLineRequest {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub batch: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
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

/// Create a purchase order in draft
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let items = payload
        .items
        .into_iter()
        .map(|item| NewPurchaseOrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: item.tax_rate,
            location_id: item.location_id,
            notes: item.notes,
        })
        .collect();

    let order = state
        .services
        .purchasing
        .create(
            ctx,
            NewPurchaseOrder {
                order_number: payload.order_number,
                supplier_id: payload.supplier_id,
                order_date: payload.order_date,
                expected_delivery: payload.expected_delivery,
                notes: payload.notes,
                items,
            },
        )
        .await?;

    Ok(created_response(order))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PurchaseOrderQuery),
    responses(
        (status = 200, description = "Purchase orders", body = serde_json::Value)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<PurchaseOrderQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (orders, total) = state
        .services
        .purchasing
        .list(ctx, query.status, query.page, query.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        query.page,
        query.per_page,
        total,
    )))
}

/// Fetch one purchase order with items
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    responses(
        (status = 200, description = "Purchase order", body = serde_json::Value),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (order, items) = state.services.purchasing.get(ctx, id).await?;
    Ok(success_response(json!({ "order": order, "items": items })))
}

/// Submit a draft order for approval
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/submit",
    responses(
        (status = 200, description = "Order pending approval", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn submit_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .purchasing
        .transition(ctx, id, PurchaseOrderStatus::Pending)
        .await?;
    Ok(success_response(order))
}

/// Approve a pending order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/approve",
    responses(
        (status = 200, description = "Order approved", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn approve_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .purchasing
        .transition(ctx, id, PurchaseOrderStatus::Approved)
        .await?;
    Ok(success_response(order))
}

/// Mark an approved order as placed with the supplier
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/mark-ordered",
    responses(
        (status = 200, description = "Order placed", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn mark_purchase_order_ordered(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .purchasing
        .transition(ctx, id, PurchaseOrderStatus::Ordered)
        .await?;
    Ok(success_response(order))
}

/// Cancel an order that has not been received
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    responses(
        (status = 200, description = "Order cancelled", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .purchasing
        .transition(ctx, id, PurchaseOrderStatus::Cancelled)
        .await?;
    Ok(success_response(order))
}

/// Receive stock against the order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receive",
    request_body = ReceiveRequest,
    responses(
        (status = 200, description = "Receipt applied", body = serde_json::Value),
        (status = 409, description = "Already received or nothing outstanding", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let lines = payload.lines.map(|lines| {
        lines
            .into_iter()
            .map(|line| ReceiveLine {
                item_id: line.item_id,
                quantity: line.quantity,
                batch: line.batch,
                expiry_date: line.expiry_date,
            })
            .collect()
    });

    let outcome = state.services.receiving.receive(ctx, id, lines).await?;

    Ok(success_response(json!({
        "order_id": outcome.order_id,
        "status": outcome.status,
        "received": outcome
            .lines
            .iter()
            .map(|line| json!({
                "item_id": line.item_id,
                "product_id": line.product_id,
                "location_id": line.location_id,
                "quantity": line.quantity,
            }))
            .collect::<Vec<_>>(),
    })))
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-orders",
            get(list_purchase_orders).post(create_purchase_order),
        )
        .route("/purchase-orders/:id", get(get_purchase_order))
        .route("/purchase-orders/:id/submit", post(submit_purchase_order))
        .route("/purchase-orders/:id/approve", post(approve_purchase_order))
        .route(
            "/purchase-orders/:id/mark-ordered",
            post(mark_purchase_order_ordered),
        )
        .route("/purchase-orders/:id/cancel", post(cancel_purchase_order))
        .route("/purchase-orders/:id/receive", post(receive_purchase_order))
}
