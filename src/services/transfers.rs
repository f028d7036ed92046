use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        location::{self, Entity as LocationEntity},
        product::{self, Entity as ProductEntity},
        stock_movement::MovementType,
        transfer::{self, Entity as TransferEntity, TransferStatus},
        transfer_item::{self, Entity as TransferItemEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{NewMovement, StockLedgerService},
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct NewTransferItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Pin the source balance row instead of letting the processor pick one.
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub batch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub reference: String,
    pub notes: Option<String>,
    pub items: Vec<NewTransferItem>,
}

/// Inter-warehouse transfers: a pending document whose processing debits the
/// source warehouse and credits the destination, all-or-nothing across items.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
    ledger: StockLedgerService,
    event_sender: EventSender,
}

impl TransferService {
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

    /// Creates a pending transfer with its items. No stock moves until
    /// [`process`](Self::process).
    #[instrument(skip(self, transfer))]
    pub async fn create(
        &self,
        ctx: TenantContext,
        transfer: NewTransfer,
    ) -> Result<transfer::Model, ServiceError> {
        if transfer.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a transfer needs at least one item".to_string(),
            ));
        }
        if transfer.from_warehouse_id == transfer.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "source and destination warehouse must differ".to_string(),
            ));
        }
        for item in &transfer.items {
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::InvalidQuantity(format!(
                    "transfer quantity must be positive, got {}",
                    item.quantity
                )));
            }
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        for warehouse_id in [transfer.from_warehouse_id, transfer.to_warehouse_id] {
            self.warehouse_of_company(&txn, ctx, warehouse_id).await?;
        }

        let now = Utc::now();
        let record = transfer::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            from_warehouse_id: Set(transfer.from_warehouse_id),
            to_warehouse_id: Set(transfer.to_warehouse_id),
            reference: Set(transfer.reference),
            status: Set(TransferStatus::Pending),
            notes: Set(transfer.notes),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = record.insert(&txn).await.map_err(ServiceError::db_error)?;

        for item in transfer.items {
            let record = transfer_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                transfer_id: Set(created.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                from_location_id: Set(item.from_location_id),
                to_location_id: Set(item.to_location_id),
                batch: Set(item.batch),
            };
            record.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::TransferCreated(created.id))
            .await;

        Ok(created)
    }

    /// Processes a pending transfer: for every item, debit the resolved
    /// source location and credit the destination in one transaction. Any
    /// failure rolls the whole transfer back and leaves it pending.
    #[instrument(skip(self))]
    pub async fn process(
        &self,
        ctx: TenantContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let record = self.transfer_of_company(&txn, ctx, transfer_id).await?;

        if record.status != TransferStatus::Pending {
            return Err(ServiceError::AlreadyProcessed(format!(
                "transfer {} is {}",
                record.reference, record.status
            )));
        }

        let items = TransferItemEntity::find()
            .filter(transfer_item::Column::TransferId.eq(record.id))
            .order_by_asc(transfer_item::Column::Id)
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if items.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "transfer {} has no items",
                record.reference
            )));
        }

        let from_warehouse = self
            .warehouse_of_company(&txn, ctx, record.from_warehouse_id)
            .await?;
        let to_warehouse = self
            .warehouse_of_company(&txn, ctx, record.to_warehouse_id)
            .await?;

        for item in &items {
            let batch = item.batch.clone().unwrap_or_default();

            let (source_location, batch) = self
                .resolve_source(&txn, &from_warehouse, item, &batch)
                .await?;
            let destination = self
                .resolve_destination(&txn, &to_warehouse, item)
                .await?;

            self.ledger
                .apply_movement(
                    &txn,
                    ctx,
                    NewMovement {
                        movement_type: MovementType::Transfer,
                        product_id: item.product_id,
                        from_location_id: Some(source_location),
                        to_location_id: Some(destination),
                        quantity: item.quantity,
                        batch,
                        expiry_date: None,
                        reference: Some(record.reference.clone()),
                        notes: None,
                    },
                )
                .await?;
        }

        let mut active: transfer::ActiveModel = record.clone().into();
        active.status = Set(TransferStatus::Completed);
        active.updated_at = Set(Utc::now());
        let completed = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::TransferCompleted(completed.id))
            .await;

        info!(
            transfer_id = %completed.id,
            reference = %completed.reference,
            items = items.len(),
            "Transfer completed"
        );

        Ok(completed)
    }

    /// Cancels a pending transfer. Processed transfers are immutable.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        ctx: TenantContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        let db = &*self.db;
        let record = self.transfer_of_company(db, ctx, transfer_id).await?;

        if !record.status.can_transition_to(TransferStatus::Cancelled) {
            return Err(ServiceError::AlreadyProcessed(format!(
                "transfer {} is {}",
                record.reference, record.status
            )));
        }

        let mut active: transfer::ActiveModel = record.into();
        active.status = Set(TransferStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let cancelled = active.update(db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::TransferCancelled(cancelled.id))
            .await;

        Ok(cancelled)
    }

    pub async fn get(
        &self,
        ctx: TenantContext,
        transfer_id: Uuid,
    ) -> Result<(transfer::Model, Vec<transfer_item::Model>), ServiceError> {
        let db = &*self.db;
        let record = self.transfer_of_company(db, ctx, transfer_id).await?;

        let items = TransferItemEntity::find()
            .filter(transfer_item::Column::TransferId.eq(record.id))
            .order_by_asc(transfer_item::Column::Id)
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
    ) -> Result<(Vec<transfer::Model>, u64), ServiceError> {
        let db = &*self.db;

        let paginator = TransferEntity::find()
            .filter(transfer::Column::CompanyId.eq(ctx.company_id))
            .order_by_desc(transfer::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let records = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((records, total))
    }

    /// Picks the balance row the debit will hit. An explicit per-item
    /// location (and batch) wins; otherwise the first row under the source
    /// warehouse with enough available stock, in location-code order, so
    /// repeated runs resolve identically.
    async fn resolve_source<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        from_warehouse: &warehouse::Model,
        item: &transfer_item::Model,
        batch: &str,
    ) -> Result<(Uuid, String), ServiceError> {
        if let Some(location_id) = item.from_location_id {
            let loc = LocationEntity::find_by_id(location_id)
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Location {} not found", location_id))
                })?;
            if loc.warehouse_id != from_warehouse.id {
                return Err(ServiceError::ValidationError(format!(
                    "location {} is not part of warehouse {}",
                    loc.code, from_warehouse.code
                )));
            }
            return Ok((location_id, batch.to_string()));
        }

        let mut query = InventoryLevelEntity::find()
            .join(JoinType::InnerJoin, inventory_level::Relation::Location.def())
            .filter(location::Column::WarehouseId.eq(from_warehouse.id))
            .filter(inventory_level::Column::ProductId.eq(item.product_id));

        if item.batch.is_some() {
            query = query.filter(inventory_level::Column::Batch.eq(batch));
        }

        let candidates = query
            .order_by_asc(location::Column::Code)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let source = candidates
            .into_iter()
            .find(|level| level.available() >= item.quantity);

        match source {
            Some(level) => Ok((level.location_id, level.batch)),
            None => {
                let sku = ProductEntity::find_by_id(item.product_id)
                    .one(conn)
                    .await
                    .ok()
                    .flatten()
                    .map(|p: product::Model| p.sku)
                    .unwrap_or_else(|| item.product_id.to_string());
                Err(ServiceError::InsufficientStock(format!(
                    "product {} in warehouse {}: no location holds {} available",
                    sku, from_warehouse.name, item.quantity
                )))
            }
        }
    }

    /// The destination defaults to the first active location of the target
    /// warehouse when the item does not pin one.
    async fn resolve_destination<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        to_warehouse: &warehouse::Model,
        item: &transfer_item::Model,
    ) -> Result<Uuid, ServiceError> {
        if let Some(location_id) = item.to_location_id {
            let loc = LocationEntity::find_by_id(location_id)
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Location {} not found", location_id))
                })?;
            if loc.warehouse_id != to_warehouse.id {
                return Err(ServiceError::ValidationError(format!(
                    "location {} is not part of warehouse {}",
                    loc.code, to_warehouse.code
                )));
            }
            return Ok(location_id);
        }

        LocationEntity::find()
            .filter(location::Column::WarehouseId.eq(to_warehouse.id))
            .filter(location::Column::IsActive.eq(true))
            .order_by_asc(location::Column::Code)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|loc| loc.id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "warehouse {} has no active location to receive into",
                    to_warehouse.code
                ))
            })
    }

    async fn transfer_of_company<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        transfer_id: Uuid,
    ) -> Result<transfer::Model, ServiceError> {
        TransferEntity::find_by_id(transfer_id)
            .filter(transfer::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))
    }

    async fn warehouse_of_company<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        warehouse_id: Uuid,
    ) -> Result<warehouse::Model, ServiceError> {
        WarehouseEntity::find_by_id(warehouse_id)
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))
    }
}
