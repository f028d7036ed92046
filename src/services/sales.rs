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
        customer::{self, Entity as CustomerEntity},
        location::Entity as LocationEntity,
        product::{self, Entity as ProductEntity},
        sales_order::{self, Entity as SalesOrderEntity, SalesOrderStatus},
        sales_order_item::{self, Entity as SalesOrderItemEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::StockLedgerService,
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct NewSalesOrderItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    /// Where outbound stock is drawn from.
    pub location_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSalesOrder {
    pub order_number: String,
    pub customer_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewSalesOrderItem>,
}

/// Sales order lifecycle up to (but not including) shipping, which is the
/// shipping workflow's job. Confirmation reserves stock; cancellation
/// releases whatever is still outstanding.
#[derive(Clone)]
pub struct SalesService {
    db: Arc<DatabaseConnection>,
    ledger: StockLedgerService,
    event_sender: EventSender,
}

impl SalesService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: StockLedgerService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            ledger,
            event_sender,
        }
    }

    #[instrument(skip(self, order))]
    pub async fn create(
        &self,
        ctx: TenantContext,
        order: NewSalesOrder,
    ) -> Result<sales_order::Model, ServiceError> {
        if order.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a sales order needs at least one item".to_string(),
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

        CustomerEntity::find_by_id(order.customer_id)
            .filter(customer::Column::CompanyId.eq(ctx.company_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", order.customer_id))
            })?;

        for item in &order.items {
            self.check_product(&txn, ctx, item.product_id).await?;
            self.check_location(&txn, ctx, item.location_id).await?;
        }

        let now = Utc::now();
        let record = sales_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            order_number: Set(order.order_number),
            customer_id: Set(order.customer_id),
            status: Set(SalesOrderStatus::Draft),
            order_date: Set(order.order_date),
            expected_shipment: Set(order.expected_shipment),
            shipping_address: Set(order.shipping_address),
            notes: Set(order.notes),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = record.insert(&txn).await.map_err(ServiceError::db_error)?;

        for item in order.items {
            let record = sales_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(created.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                tax_rate: Set(item.tax_rate),
                shipped: Set(Decimal::ZERO),
                location_id: Set(item.location_id),
                notes: Set(item.notes),
            };
            record.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::SalesOrderCreated(created.id))
            .await;

        info!(order_id = %created.id, order_number = %created.order_number, "Sales order created");

        Ok(created)
    }

    /// Confirms a draft order and reserves each line's stock at its source
    /// location. Reservation failures abort the confirmation entirely.
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
    ) -> Result<sales_order::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = self.order_of_company(&txn, ctx, order_id).await?;

        if !order.status.can_transition_to(SalesOrderStatus::Confirmed) {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "sales order {}: {} -> {}",
                order.order_number,
                order.status,
                SalesOrderStatus::Confirmed
            )));
        }

        let items = SalesOrderItemEntity::find()
            .filter(sales_order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        for item in &items {
            self.ledger
                .reserve_at_location(&txn, item.product_id, item.location_id, item.quantity)
                .await?;
        }

        let old_status = order.status;
        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(SalesOrderStatus::Confirmed);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::SalesOrderStatusChanged {
                order_id: updated.id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Cancels an order, releasing whatever reservation is still
    /// outstanding on each line.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
    ) -> Result<sales_order::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = self.order_of_company(&txn, ctx, order_id).await?;

        if !order.status.can_transition_to(SalesOrderStatus::Cancelled) {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "sales order {}: {} -> {}",
                order.order_number,
                order.status,
                SalesOrderStatus::Cancelled
            )));
        }

        // Draft orders never reserved anything.
        if order.status != SalesOrderStatus::Draft {
            let items = SalesOrderItemEntity::find()
                .filter(sales_order_item::Column::OrderId.eq(order.id))
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            for item in &items {
                let outstanding = item.outstanding();
                if outstanding > Decimal::ZERO {
                    self.ledger
                        .release_at_location(&txn, item.product_id, item.location_id, outstanding)
                        .await?;
                }
            }
        }

        let old_status = order.status;
        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(SalesOrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::SalesOrderStatusChanged {
                order_id: updated.id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Post-shipment transitions (`invoiced`, `completed`) and `processing`.
    /// Shipping states (`partial`, `shipped`) are derived by the shipping
    /// workflow and rejected here.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
        new_status: SalesOrderStatus,
    ) -> Result<sales_order::Model, ServiceError> {
        if matches!(
            new_status,
            SalesOrderStatus::Partial | SalesOrderStatus::Shipped
        ) {
            return Err(ServiceError::ValidationError(
                "shipping state is derived from item shipments, not set directly".to_string(),
            ));
        }
        if matches!(
            new_status,
            SalesOrderStatus::Confirmed | SalesOrderStatus::Cancelled
        ) {
            return Err(ServiceError::ValidationError(
                "use the confirm/cancel operations for reservation-aware transitions".to_string(),
            ));
        }

        let db = &*self.db;
        let order = self.order_of_company(db, ctx, order_id).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "sales order {}: {} -> {}",
                order.order_number, order.status, new_status
            )));
        }

        let old_status = order.status;
        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::SalesOrderStatusChanged {
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
    ) -> Result<(sales_order::Model, Vec<sales_order_item::Model>), ServiceError> {
        let db = &*self.db;
        let order = self.order_of_company(db, ctx, order_id).await?;

        let items = SalesOrderItemEntity::find()
            .filter(sales_order_item::Column::OrderId.eq(order.id))
            .order_by_asc(sales_order_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((order, items))
    }

    pub async fn list(
        &self,
        ctx: TenantContext,
        status: Option<SalesOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<sales_order::Model>, u64), ServiceError> {
        let db = &*self.db;

        let mut query =
            SalesOrderEntity::find().filter(sales_order::Column::CompanyId.eq(ctx.company_id));
        if let Some(status) = status {
            query = query.filter(sales_order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(sales_order::Column::OrderDate)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((orders, total))
    }

    pub(crate) async fn order_of_company<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        order_id: Uuid,
    ) -> Result<sales_order::Model, ServiceError> {
        SalesOrderEntity::find_by_id(order_id)
            .filter(sales_order::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sales order {} not found", order_id)))
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
