#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use stockcore_api::{
    config::AppConfig,
    db,
    entities::{
        customer::CustomerKind, inventory_level, location, product, product::UnitOfMeasure,
        warehouse, warehouse::WarehouseKind,
    },
    events::{self, EventSender},
    services::{
        adjustments::AdjustmentRequest,
        catalog::{NewCustomer, NewProduct, NewSupplier},
        topology::{NewLocation, NewWarehouse},
    },
    tenant::TenantContext,
    AppServices, AppState,
};

/// Test harness backed by an in-memory SQLite database with the real
/// migrations applied.
pub struct TestApp {
    pub state: AppState,
    pub ctx: TenantContext,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single pooled connection keeps every test statement on the same
        // in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations failed");

        let db_arc = Arc::new(pool);
        let (tx, rx) = mpsc::channel(64);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(db_arc.clone(), event_sender.clone());
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            ctx: TenantContext::new(Uuid::new_v4(), Uuid::new_v4()),
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// A context for a different tenant, for isolation checks.
    pub fn other_tenant(&self) -> TenantContext {
        TenantContext::new(Uuid::new_v4(), Uuid::new_v4())
    }

    pub async fn create_warehouse(&self, code: &str) -> warehouse::Model {
        self.services()
            .topology
            .create_warehouse(
                self.ctx,
                NewWarehouse {
                    name: format!("Warehouse {}", code),
                    code: code.to_string(),
                    kind: WarehouseKind::Main,
                    address: "1 Depot Road".to_string(),
                    contact_person: None,
                    contact_phone: None,
                    contact_email: None,
                    notes: None,
                },
            )
            .await
            .expect("warehouse creation failed")
    }

    pub async fn create_location(&self, warehouse_id: Uuid, code: &str) -> location::Model {
        self.services()
            .topology
            .create_location(
                self.ctx,
                warehouse_id,
                NewLocation {
                    name: format!("Location {}", code),
                    code: code.to_string(),
                    aisle: None,
                    shelf: None,
                    bin: None,
                    capacity: None,
                    notes: None,
                },
            )
            .await
            .expect("location creation failed")
    }

    pub async fn create_product(&self, sku: &str) -> product::Model {
        self.services()
            .catalog
            .create_product(
                self.ctx,
                NewProduct {
                    name: format!("Product {}", sku),
                    sku: sku.to_string(),
                    barcode: None,
                    category_id: None,
                    unit: UnitOfMeasure::Piece,
                    description: None,
                    purchase_price: dec!(10.00),
                    selling_price: dec!(15.00),
                    tax_rate: dec!(0),
                    min_stock: dec!(0),
                    max_stock: None,
                    weight: None,
                    volume: None,
                },
            )
            .await
            .expect("product creation failed")
    }

    pub async fn create_supplier(&self, code: &str) -> Uuid {
        self.services()
            .catalog
            .create_supplier(
                self.ctx,
                NewSupplier {
                    name: format!("Supplier {}", code),
                    code: code.to_string(),
                    contact_person: None,
                    phone: None,
                    email: None,
                    address: None,
                    tax_id: None,
                    payment_terms: None,
                    lead_time_days: None,
                    notes: None,
                },
            )
            .await
            .expect("supplier creation failed")
            .id
    }

    pub async fn create_customer(&self, code: &str) -> Uuid {
        self.services()
            .catalog
            .create_customer(
                self.ctx,
                NewCustomer {
                    kind: CustomerKind::Business,
                    name: format!("Customer {}", code),
                    code: code.to_string(),
                    contact_person: None,
                    phone: None,
                    email: None,
                    address: None,
                    tax_id: None,
                    payment_terms: None,
                    credit_limit: None,
                    notes: None,
                },
            )
            .await
            .expect("customer creation failed")
            .id
    }

    /// Puts stock on a location through the adjustment workflow, so the
    /// seeding itself goes through the ledger.
    pub async fn stock(&self, product_id: Uuid, location_id: Uuid, quantity: Decimal) {
        self.stock_batch(product_id, location_id, "", quantity).await;
    }

    pub async fn stock_batch(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        quantity: Decimal,
    ) {
        self.services()
            .adjustments
            .adjust(
                self.ctx,
                AdjustmentRequest {
                    product_id,
                    location_id,
                    batch: batch.to_string(),
                    delta: quantity,
                    notes: Some("seed".to_string()),
                },
            )
            .await
            .expect("stock seeding failed");
    }

    pub async fn level(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
    ) -> Option<inventory_level::Model> {
        self.services()
            .ledger
            .find_level(self.state.db.as_ref(), product_id, location_id, batch)
            .await
            .expect("level lookup failed")
    }

    pub async fn quantity(&self, product_id: Uuid, location_id: Uuid) -> Decimal {
        self.level(product_id, location_id, "")
            .await
            .map(|level| level.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("bad date literal")
}
