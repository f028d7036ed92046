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
    entities::sales_order::SalesOrderStatus,
    errors::ServiceError,
    services::{
        sales::{NewSalesOrder, NewSalesOrderItem},
        shipping::{ShipLine, ShipRequest},
    },
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSalesOrderRequest {
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    pub customer_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<SalesOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SalesOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    /// Source location for outbound stock
    pub location_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShipOrderRequest {
    #[validate(length(min = 1, max = 50))]
    pub shipment_number: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    /// Omit to ship every outstanding item in full
    pub lines: Option<Vec<ShipLineRequest>>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShipLineRequest {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub batch: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSalesOrderStatusRequest {
    pub status: SalesOrderStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SalesOrderQuery {
    pub status: Option<SalesOrderStatus>,
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

/// Create a sales order in draft
#[utoipa::path(
    post,
    path = "/api/v1/sales-orders",
    request_body = CreateSalesOrderRequest,
    responses(
        (status = 201, description = "Sales order created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn create_sales_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateSalesOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let items = payload
        .items
        .into_iter()
        .map(|item| NewSalesOrderItem {
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
        .sales
        .create(
            ctx,
            NewSalesOrder {
                order_number: payload.order_number,
                customer_id: payload.customer_id,
                order_date: payload.order_date,
                expected_shipment: payload.expected_shipment,
                shipping_address: payload.shipping_address,
                notes: payload.notes,
                items,
            },
        )
        .await?;

    Ok(created_response(order))
}

/// List sales orders
#[utoipa::path(
    get,
    path = "/api/v1/sales-orders",
    params(SalesOrderQuery),
    responses(
        (status = 200, description = "Sales orders", body = serde_json::Value)
    ),
    tag = "sales-orders"
)]
pub async fn list_sales_orders(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<SalesOrderQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (orders, total) = state
        .services
        .sales
        .list(ctx, query.status, query.page, query.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        query.page,
        query.per_page,
        total,
    )))
}

/// Fetch one sales order with items
#[utoipa::path(
    get,
    path = "/api/v1/sales-orders/{id}",
    responses(
        (status = 200, description = "Sales order", body = serde_json::Value),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn get_sales_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (order, items) = state.services.sales.get(ctx, id).await?;
    Ok(success_response(json!({ "order": order, "items": items })))
}

/// Confirm a draft order, reserving stock for each line
#[utoipa::path(
    post,
    path = "/api/v1/sales-orders/{id}/confirm",
    responses(
        (status = 200, description = "Order confirmed", body = serde_json::Value),
        (status = 422, description = "Insufficient stock to reserve", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn confirm_sales_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.sales.confirm(ctx, id).await?;
    Ok(success_response(order))
}

/// Cancel an order, releasing outstanding reservations
#[utoipa::path(
    post,
    path = "/api/v1/sales-orders/{id}/cancel",
    responses(
        (status = 200, description = "Order cancelled", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn cancel_sales_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.sales.cancel(ctx, id).await?;
    Ok(success_response(order))
}

/// Post-shipment lifecycle transitions (processing, invoiced, completed)
#[utoipa::path(
    post,
    path = "/api/v1/sales-orders/{id}/status",
    request_body = UpdateSalesOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = serde_json::Value),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn update_sales_order_status(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSalesOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .sales
        .transition(ctx, id, payload.status)
        .await?;
    Ok(success_response(order))
}

/// Ship stock against the order
#[utoipa::path(
    post,
    path = "/api/v1/sales-orders/{id}/ship",
    request_body = ShipOrderRequest,
    responses(
        (status = 200, description = "Shipment applied", body = serde_json::Value),
        (status = 409, description = "Already shipped or nothing outstanding", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "sales-orders"
)]
pub async fn ship_sales_order(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShipOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let lines = payload.lines.map(|lines| {
        lines
            .into_iter()
            .map(|line| ShipLine {
                item_id: line.item_id,
                quantity: line.quantity,
                batch: line.batch,
            })
            .collect()
    });

    let outcome = state
        .services
        .shipping
        .ship(
            ctx,
            id,
            ShipRequest {
                shipment_number: payload.shipment_number,
                carrier: payload.carrier,
                tracking_number: payload.tracking_number,
                notes: payload.notes,
                lines,
            },
        )
        .await?;

    Ok(success_response(json!({
        "shipment": outcome.shipment,
        "order_status": outcome.order_status,
    })))
}

pub fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/sales-orders",
            get(list_sales_orders).post(create_sales_order),
        )
        .route("/sales-orders/:id", get(get_sales_order))
        .route("/sales-orders/:id/confirm", post(confirm_sales_order))
        .route("/sales-orders/:id/cancel", post(cancel_sales_order))
        .route("/sales-orders/:id/status", post(update_sales_order_status))
        .route("/sales-orders/:id/ship", post(ship_sales_order))
}
