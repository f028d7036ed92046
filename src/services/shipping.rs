use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        sales_order::{self, SalesOrderStatus},
        sales_order_item::{self, Entity as SalesOrderItemEntity},
        shipment::{self, Entity as ShipmentEntity, ShipmentStatus},
        shipment_item,
        stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        ledger::{NewMovement, StockLedgerService},
        sales::SalesService,
    },
    tenant::TenantContext,
};

/// One line of a partial shipment. Omitting `lines` on a ship call takes
/// every outstanding item in full.
#[derive(Debug, Clone)]
pub struct ShipLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
    /// Pin the batch to draw from; otherwise batches are consumed in batch
    /// order.
    pub batch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShipRequest {
    pub shipment_number: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub lines: Option<Vec<ShipLine>>,
}

#[derive(Debug, Clone)]
pub struct ShipOutcome {
    pub shipment: shipment::Model,
    pub order_status: SalesOrderStatus,
}

/// Sales shipping: the decrementing mirror of receiving. Consumes the
/// order's reservations, debits each line's source location, and records the
/// shipment document.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
    ledger: StockLedgerService,
    sales: SalesService,
    event_sender: EventSender,
}

impl ShippingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: StockLedgerService,
        sales: SalesService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            ledger,
            sales,
            event_sender,
        }
    }

    /// Ships stock against a sales order. One transaction covers the
    /// reservation release, the sale debits, the shipment document, the item
    /// updates, and the order status recomputation.
    #[instrument(skip(self, request))]
    pub async fn ship(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
        request: ShipRequest,
    ) -> Result<ShipOutcome, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = self.sales.order_of_company(&txn, ctx, order_id).await?;

        match order.status {
            SalesOrderStatus::Shipped
            | SalesOrderStatus::Invoiced
            | SalesOrderStatus::Completed => {
                return Err(ServiceError::AlreadyProcessed(format!(
                    "sales order {} is fully shipped",
                    order.order_number
                )));
            }
            SalesOrderStatus::Cancelled => {
                return Err(ServiceError::AlreadyProcessed(format!(
                    "sales order {} is cancelled",
                    order.order_number
                )));
            }
            status if !status.is_shippable() => {
                return Err(ServiceError::InvalidStatusTransition(format!(
                    "sales order {} is {} and cannot be shipped",
                    order.order_number, status
                )));
            }
            _ => {}
        }

        let items = SalesOrderItemEntity::find()
            .filter(sales_order_item::Column::OrderId.eq(order.id))
            .order_by_asc(sales_order_item::Column::Id)
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let worklist = self.build_worklist(&order, &items, request.lines)?;
        if worklist.is_empty() {
            return Err(ServiceError::NothingToShip(format!(
                "all items of sales order {} are already shipped",
                order.order_number
            )));
        }

        let now = Utc::now();
        let shipment_record = shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            shipment_number: Set(request.shipment_number.clone()),
            order_id: Set(order.id),
            status: Set(ShipmentStatus::Shipped),
            shipment_date: Set(Some(now.date_naive())),
            tracking_number: Set(request.tracking_number.clone()),
            carrier: Set(request.carrier.clone()),
            notes: Set(request.notes.clone()),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let shipment = shipment_record
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut shipped_by_item: Vec<(sales_order_item::Model, Decimal)> = Vec::new();

        for (item, quantity, batch_override) in worklist {
            // Give back the order's hold before debiting, clamped so an
            // unconfirmed order (nothing reserved) ships cleanly too.
            self.ledger
                .release_at_location(&txn, item.product_id, item.location_id, quantity)
                .await?;

            let slices = self
                .resolve_slices(&txn, &item, quantity, batch_override)
                .await?;

            for slice in &slices {
                self.ledger
                    .apply_movement(
                        &txn,
                        ctx,
                        NewMovement {
                            movement_type: MovementType::Sale,
                            product_id: item.product_id,
                            from_location_id: Some(item.location_id),
                            to_location_id: None,
                            quantity: slice.quantity,
                            batch: slice.batch.clone(),
                            expiry_date: None,
                            reference: Some(request.shipment_number.clone()),
                            notes: None,
                        },
                    )
                    .await?;

                let record = shipment_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    shipment_id: Set(shipment.id),
                    order_item_id: Set(item.id),
                    quantity: Set(slice.quantity),
                    batch: Set(slice.batch.clone()),
                    expiry_date: Set(slice.expiry_date),
                };
                record.insert(&txn).await.map_err(ServiceError::db_error)?;
            }

            let new_shipped = item.shipped + quantity;
            let mut active: sales_order_item::ActiveModel = item.clone().into();
            active.shipped = Set(new_shipped);
            active.update(&txn).await.map_err(ServiceError::db_error)?;

            shipped_by_item.push((item, new_shipped));
        }

        let fully_shipped = items.iter().all(|item| {
            let shipped = shipped_by_item
                .iter()
                .find(|(updated, _)| updated.id == item.id)
                .map(|(_, new_shipped)| *new_shipped)
                .unwrap_or(item.shipped);
            shipped >= item.quantity
        });

        let new_status = if fully_shipped {
            SalesOrderStatus::Shipped
        } else {
            SalesOrderStatus::Partial
        };

        if new_status != order.status {
            if !order.status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidStatusTransition(format!(
                    "sales order {}: {} -> {}",
                    order.order_number, order.status, new_status
                )));
            }
            let mut active: sales_order::ActiveModel = order.clone().into();
            active.status = Set(new_status);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::SalesOrderShipped {
                order_id: order.id,
                shipment_id: shipment.id,
                fully_shipped,
            })
            .await;

        info!(
            order_id = %order.id,
            shipment_id = %shipment.id,
            shipment_number = %shipment.shipment_number,
            fully_shipped,
            "Sales order shipped"
        );

        Ok(ShipOutcome {
            shipment,
            order_status: new_status,
        })
    }

    /// Marks a shipped parcel as delivered.
    #[instrument(skip(self))]
    pub async fn deliver(
        &self,
        ctx: TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db;
        let record = self.shipment_of_company(db, ctx, shipment_id).await?;

        if !record.status.can_transition_to(ShipmentStatus::Delivered) {
            return Err(ServiceError::InvalidStatusTransition(format!(
                "shipment {}: {} -> {}",
                record.shipment_number,
                record.status,
                ShipmentStatus::Delivered
            )));
        }

        let mut active: shipment::ActiveModel = record.into();
        active.status = Set(ShipmentStatus::Delivered);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::ShipmentStatusChanged {
                shipment_id: updated.id,
                new_status: updated.status.to_string(),
            })
            .await;

        Ok(updated)
    }

    pub async fn get(
        &self,
        ctx: TenantContext,
        shipment_id: Uuid,
    ) -> Result<(shipment::Model, Vec<shipment_item::Model>), ServiceError> {
        let db = &*self.db;
        let record = self.shipment_of_company(db, ctx, shipment_id).await?;

        let items = shipment_item::Entity::find()
            .filter(shipment_item::Column::ShipmentId.eq(record.id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((record, items))
    }

    pub async fn list(
        &self,
        ctx: TenantContext,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let db = &*self.db;

        let paginator = ShipmentEntity::find()
            .filter(shipment::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(shipment::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let records = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((records, total))
    }

    fn build_worklist(
        &self,
        order: &sales_order::Model,
        items: &[sales_order_item::Model],
        lines: Option<Vec<ShipLine>>,
    ) -> Result<Vec<(sales_order_item::Model, Decimal, Option<String>)>, ServiceError> {
        match lines {
            None => Ok(items
                .iter()
                .filter(|item| item.shipped < item.quantity)
                .map(|item| (item.clone(), item.outstanding(), None))
                .collect()),
            Some(lines) => {
                let mut seen = std::collections::HashSet::new();
                let mut worklist = Vec::with_capacity(lines.len());
                for line in lines {
                    if !seen.insert(line.item_id) {
                        return Err(ServiceError::ValidationError(format!(
                            "item {} listed more than once in one shipment",
                            line.item_id
                        )));
                    }
                    let item = items
                        .iter()
                        .find(|item| item.id == line.item_id)
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "item {} does not belong to sales order {}",
                                line.item_id, order.order_number
                            ))
                        })?;

                    if line.quantity <= Decimal::ZERO {
                        return Err(ServiceError::InvalidQuantity(format!(
                            "shipment quantity must be positive, got {}",
                            line.quantity
                        )));
                    }
                    if line.quantity > item.outstanding() {
                        return Err(ServiceError::ValidationError(format!(
                            "cannot ship more than ordered: ordered {}, already shipped {}, shipping {}",
                            item.quantity, item.shipped, line.quantity
                        )));
                    }

                    worklist.push((item.clone(), line.quantity, line.batch));
                }
                Ok(worklist)
            }
        }
    }

    /// Splits one line's quantity over the batch rows it will be drawn from.
    /// A pinned batch must cover the full quantity by itself; otherwise
    /// batches are consumed greedily in batch order.
    async fn resolve_slices<C: ConnectionTrait>(
        &self,
        conn: &C,
        item: &sales_order_item::Model,
        quantity: Decimal,
        batch_override: Option<String>,
    ) -> Result<Vec<ShipSlice>, ServiceError> {
        let levels = self
            .ledger
            .levels_at(conn, item.product_id, item.location_id)
            .await?;

        if let Some(batch) = batch_override {
            let level = levels.iter().find(|level| level.batch == batch);
            return match level {
                Some(level) if level.available() >= quantity => Ok(vec![ShipSlice {
                    batch,
                    quantity,
                    expiry_date: level.expiry_date,
                }]),
                _ => Err(self
                    .ledger
                    .insufficient_stock(
                        conn,
                        item.product_id,
                        item.location_id,
                        level.map(|l| l.available()).unwrap_or(Decimal::ZERO),
                        quantity,
                    )
                    .await),
            };
        }

        let total_available: Decimal = levels.iter().map(|l| l.available()).sum();
        if total_available < quantity {
            return Err(self
                .ledger
                .insufficient_stock(
                    conn,
                    item.product_id,
                    item.location_id,
                    total_available,
                    quantity,
                )
                .await);
        }

        let mut remaining = quantity;
        let mut slices = Vec::new();
        for level in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(level.available());
            if take <= Decimal::ZERO {
                continue;
            }
            slices.push(ShipSlice {
                batch: level.batch.clone(),
                quantity: take,
                expiry_date: level.expiry_date,
            });
            remaining -= take;
        }

        Ok(slices)
    }

    async fn shipment_of_company<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        ShipmentEntity::find_by_id(shipment_id)
            .filter(shipment::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
    }
}

#[derive(Debug, Clone)]
struct ShipSlice {
    batch: String,
    quantity: Decimal,
    expiry_date: Option<chrono::NaiveDate>,
}
