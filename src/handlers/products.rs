use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    entities::{customer::CustomerKind, product::UnitOfMeasure},
    errors::ServiceError,
    services::catalog::{NewCategory, NewCustomer, NewProduct, NewSupplier, ProductPatch},
    tenant::TenantContext,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: UnitOfMeasure,
    pub description: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    pub kind: CustomerKind,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub payment_terms: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub notes: Option<String>,
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(
            ctx,
            NewProduct {
                name: payload.name,
                sku: payload.sku,
                barcode: payload.barcode,
                category_id: payload.category_id,
                unit: payload.unit,
                description: payload.description,
                purchase_price: payload.purchase_price,
                selling_price: payload.selling_price,
                tax_rate: payload.tax_rate,
                min_stock: payload.min_stock,
                max_stock: payload.max_stock,
                weight: payload.weight,
                volume: payload.volume,
            },
        )
        .await?;

    Ok(created_response(product))
}

/// Update a product's descriptive and pricing fields
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = serde_json::Value),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(
            ctx,
            id,
            ProductPatch {
                name: payload.name,
                barcode: payload.barcode,
                category_id: payload.category_id,
                description: payload.description,
                purchase_price: payload.purchase_price,
                selling_price: payload.selling_price,
                tax_rate: payload.tax_rate,
                min_stock: payload.min_stock,
                max_stock: payload.max_stock,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok(success_response(product))
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product", body = serde_json::Value),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(ctx, id).await?;
    Ok(success_response(product))
}

/// List products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams),
    responses(
        (status = 200, description = "Products", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (products, total) = state
        .services
        .catalog
        .list_products(ctx, pagination.page, pagination.per_page)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Create a product category
#[utoipa::path(
    post,
    path = "/api/v1/product-categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn create_category(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let category = state
        .services
        .catalog
        .create_category(
            ctx,
            NewCategory {
                name: payload.name,
                parent_id: payload.parent_id,
                description: payload.description,
            },
        )
        .await?;

    Ok(created_response(category))
}

/// List product categories
#[utoipa::path(
    get,
    path = "/api/v1/product-categories",
    responses(
        (status = 200, description = "Categories", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.services.catalog.list_categories(ctx).await?;
    Ok(success_response(categories))
}

/// Create a supplier
#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = CreateSupplierRequest,
    responses(
        (status = 201, description = "Supplier created", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let supplier = state
        .services
        .catalog
        .create_supplier(
            ctx,
            NewSupplier {
                name: payload.name,
                code: payload.code,
                contact_person: payload.contact_person,
                phone: payload.phone,
                email: payload.email,
                address: payload.address,
                tax_id: payload.tax_id,
                payment_terms: payload.payment_terms,
                lead_time_days: payload.lead_time_days,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response(supplier))
}

/// List suppliers
#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    responses(
        (status = 200, description = "Suppliers", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ServiceError> {
    let suppliers = state.services.catalog.list_suppliers(ctx).await?;
    Ok(success_response(suppliers))
}

/// Create a customer
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .catalog
        .create_customer(
            ctx,
            NewCustomer {
                kind: payload.kind,
                name: payload.name,
                code: payload.code,
                contact_person: payload.contact_person,
                phone: payload.phone,
                email: payload.email,
                address: payload.address,
                tax_id: payload.tax_id,
                payment_terms: payload.payment_terms,
                credit_limit: payload.credit_limit,
                notes: payload.notes,
            },
        )
        .await?;

    Ok(created_response(customer))
}

/// List customers
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    responses(
        (status = 200, description = "Customers", body = serde_json::Value)
    ),
    tag = "catalog"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, ServiceError> {
    let customers = state.services.catalog.list_customers(ctx).await?;
    Ok(success_response(customers))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product))
        .route(
            "/product-categories",
            get(list_categories).post(create_category),
        )
        .route("/suppliers", get(list_suppliers).post(create_supplier))
        .route("/customers", get(list_customers).post(create_customer))
}
