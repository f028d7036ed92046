use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockcore API",
        version = "0.3.0",
        description = r#"
# Stockcore Inventory & Fulfillment API

Multi-tenant inventory and order fulfillment built around a transactional
stock ledger.

## Tenancy

Every request carries the authenticated tenant in two headers set by the
gateway in front of this service:

```
X-Company-Id: <uuid>
X-Actor-Id: <uuid>
```

## The ledger

Balances are tracked per (product, location, batch). Every change flows
through an append-only stock movement log; replaying the log for a triple
reproduces its balance exactly. Workflows (receive, ship, transfer, adjust)
are atomic: they fully apply or leave no trace.

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::get_product,
        crate::handlers::products::list_products,
        crate::handlers::products::create_category,
        crate::handlers::products::list_categories,
        crate::handlers::products::create_supplier,
        crate::handlers::products::list_suppliers,
        crate::handlers::products::create_customer,
        crate::handlers::products::list_customers,
        crate::handlers::warehouses::create_warehouse,
        crate::handlers::warehouses::list_warehouses,
        crate::handlers::warehouses::get_warehouse,
        crate::handlers::warehouses::create_location,
        crate::handlers::warehouses::list_locations,
        crate::handlers::inventory::list_levels,
        crate::handlers::inventory::list_movements,
        crate::handlers::inventory::low_stock,
        crate::handlers::inventory::audit_level,
        crate::handlers::inventory::adjust_stock,
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::submit_purchase_order,
        crate::handlers::purchase_orders::approve_purchase_order,
        crate::handlers::purchase_orders::mark_purchase_order_ordered,
        crate::handlers::purchase_orders::cancel_purchase_order,
        crate::handlers::purchase_orders::receive_purchase_order,
        crate::handlers::sales_orders::create_sales_order,
        crate::handlers::sales_orders::list_sales_orders,
        crate::handlers::sales_orders::get_sales_order,
        crate::handlers::sales_orders::confirm_sales_order,
        crate::handlers::sales_orders::cancel_sales_order,
        crate::handlers::sales_orders::update_sales_order_status,
        crate::handlers::sales_orders::ship_sales_order,
        crate::handlers::transfers::create_transfer,
        crate::handlers::transfers::list_transfers,
        crate::handlers::transfers::get_transfer,
        crate::handlers::transfers::process_transfer,
        crate::handlers::transfers::cancel_transfer,
        crate::handlers::shipments::list_shipments,
        crate::handlers::shipments::get_shipment,
        crate::handlers::shipments::deliver_shipment,
    ),
    tags(
        (name = "catalog", description = "Products, categories, suppliers, customers"),
        (name = "topology", description = "Warehouses and locations"),
        (name = "inventory", description = "Stock balances, movement ledger, adjustments"),
        (name = "purchase-orders", description = "Purchase order lifecycle and receiving"),
        (name = "sales-orders", description = "Sales order lifecycle and shipping"),
        (name = "transfers", description = "Inter-warehouse transfers"),
        (name = "shipments", description = "Outbound shipment documents"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
