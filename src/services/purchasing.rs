use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        location::Entity as LocationEntity,
        product::{self, Entity as ProductEntity},
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItemEntity},
        supplier::{self, Entity as SupplierEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct NewPurchaseOrderItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    /// Where received stock lands.
    pub location_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub order_number: String,
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseOrderItem>,
}

/// Purchase order lifecycle up to (but not including) receiving, which is
/// the receiving workflow's job.
#[derive(Clone)]
pub struct PurchasingService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl PurchasingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, order))]
    pub async fn create(
        &self,
        ctx: TenantContext,
        order: NewPurchaseOrder,
    ) -> Result<purchase_order::Model, ServiceError> {
        if order.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a purchase order needs at least one item".to_string(),
            ));
        }
        for item in &order.items {
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::InvalidQuantity(format!(
                    "ordered quantity must be positive, got {}",
                    item.quantity
                )));
            }
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        SupplierEntity::find_by_id(order.supplier_id)
            .filter(supplier::Column::CompanyId.eq(ctx.company_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Supplier {} not found", order.supplier_id))
            })?;

        for item in &order.items {
            self.check_product(&txn, ctx, item.product_id).await?;
            self.check_location(&txn, ctx, item.location_id).await?;
        }

        let now = Utc::now();
        let record = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            order_number: Set(order.order_number),
            supplier_id: Set(order.supplier_id),
            status: Set(PurchaseOrderStatus::Draft),
            order_date: Set(order.order_date),
            expected_delivery: Set(order.expected_delivery),
            notes: Set(order.notes),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = record.insert(&txn).await.map_err(ServiceError::db_error)?;

        for item in order.items {
            let record = purchase_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(created.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                tax_rate: Set(item.tax_rate),
                received: Set(Decimal::ZERO),
                location_id: Set(item.location_id),
                notes: Set(item.notes),
            };
            record.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderCreated(created.id))
            .await;

        info!(order_id = %created.id, order_number = %created.order_number, "Purchase order created");

        Ok(created)
    }

    /// Moves an order along its lifecycle. Receipt states (`partial`,
    /// `received`) are derived by the receiving workflow and rejected here.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
        new_status: PurchaseOrderStatus,
    ) -> Result<purchase_order::Model, ServiceError> {
        if matches!(
            new_status,
            PurchaseOrderStatus::Partial | PurchaseOrderStatus::Received
        ) {
            return Err(ServiceError::ValidationError(
                "receipt state is derived from item receipts, not set directly".to_string(),
            ));
        }

        let db = &*self.db;
        let order = self.order_of_company(db, ctx, order_id).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "purchase order {}: {} -> {}",
                order.order_number, order.status, new_status
            )));
        }

        let old_status = order.status;
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderStatusChanged {
                order_id: updated.id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        Ok(updated)
    }

    pub async fn get(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
    ) -> Result<(purchase_order::Model, Vec<purchase_order_item::Model>), ServiceError> {
        let db = &*self.db;
        let order = self.order_of_company(db, ctx, order_id).await?;

        let items = PurchaseOrderItemEntity::find()
            .filter(purchase_order_item::Column::OrderId.eq(order.id))
            .order_by_asc(purchase_order_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((order, items))
    }

    pub async fn list(
        &self,
        ctx: TenantContext,
        status: Option<PurchaseOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let db = &*self.db;

        let mut query = PurchaseOrderEntity::find()
            .filter(purchase_order::Column::CompanyId.eq(ctx.company_id));
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(purchase_order::Column::OrderDate)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((orders, total))
    }

    async fn order_of_company<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        order_id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        PurchaseOrderEntity::find_by_id(order_id)
            .filter(purchase_order::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", order_id))
            })
    }

    async fn check_product<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(())
    }

    async fn check_location<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        location_id: Uuid,
    ) -> Result<(), ServiceError> {
        let loc = LocationEntity::find_by_id(location_id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))?;

        WarehouseEntity::find_by_id(loc.warehouse_id)
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))?;
        Ok(())
    }
}
