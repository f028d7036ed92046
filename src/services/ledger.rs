use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        location::{self, Entity as LocationEntity},
        product::{self, Entity as ProductEntity},
        stock_movement::{self, Entity as StockMovementEntity, MovementType},
    },
    errors::ServiceError,
    tenant::TenantContext,
};

/// Input for one ledger mutation. `quantity` is always a positive magnitude;
/// direction comes from which location fields are set.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub product_id: Uuid,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub quantity: Decimal,
    pub batch: String,
    pub expiry_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Narrowing filters for the balance read surface.
#[derive(Debug, Clone, Default)]
pub struct LevelFilter {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub batch: Option<String>,
}

/// Narrowing filters for the movement read surface.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
}

/// Outcome of reconciling one balance row against its movement history.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct LedgerAudit {
    pub level_id: Uuid,
    pub balance_quantity: Decimal,
    pub replayed_quantity: Decimal,
    pub consistent: bool,
}

/// The stock ledger: the sole writer of `inventory_levels.quantity`.
///
/// Every mutation goes through [`apply_movement`](Self::apply_movement),
/// which debits/credits balance rows and appends the movement record in one
/// atomic step. The methods take any `ConnectionTrait` so workflows can pass
/// their own transaction and span several movements atomically.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DatabaseConnection>,
}

impl StockLedgerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Looks up the balance row for one (product, location, batch) triple.
    pub async fn find_level<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
    ) -> Result<Option<inventory_level::Model>, ServiceError> {
        InventoryLevelEntity::find()
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .filter(inventory_level::Column::LocationId.eq(location_id))
            .filter(inventory_level::Column::Batch.eq(batch))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Returns the balance row for the triple, creating a zero row on first
    /// movement into it. Rows are never deleted afterwards, even at zero.
    pub async fn get_or_create_level<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        expiry_date: Option<NaiveDate>,
    ) -> Result<inventory_level::Model, ServiceError> {
        if let Some(existing) = self.find_level(conn, product_id, location_id, batch).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let level = inventory_level::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            location_id: Set(location_id),
            batch: Set(batch.to_string()),
            quantity: Set(Decimal::ZERO),
            reserved: Set(Decimal::ZERO),
            expiry_date: Set(expiry_date),
            last_counted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        level.insert(conn).await.map_err(ServiceError::db_error)
    }

    /// Applies one movement: validates the request, debits the source row
    /// (guarded so the balance can never go negative), credits the
    /// destination row (creating it if absent), and appends the immutable
    /// movement record. All effects share the caller's connection, so inside
    /// a transaction they commit or roll back together.
    #[instrument(skip(self, conn))]
    pub async fn apply_movement<C: ConnectionTrait>(
        &self,
        conn: &C,
        ctx: TenantContext,
        movement: NewMovement,
    ) -> Result<stock_movement::Model, ServiceError> {
        if movement.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "movement quantity must be positive, got {}",
                movement.quantity
            )));
        }
        self.check_shape(&movement)?;

        if let Some(from) = movement.from_location_id {
            self.debit(conn, movement.product_id, from, &movement.batch, movement.quantity)
                .await?;
        }

        if let Some(to) = movement.to_location_id {
            self.credit(
                conn,
                movement.product_id,
                to,
                &movement.batch,
                movement.quantity,
                movement.expiry_date,
            )
            .await?;
        }

        let record = stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            movement_type: Set(movement.movement_type),
            product_id: Set(movement.product_id),
            from_location_id: Set(movement.from_location_id),
            to_location_id: Set(movement.to_location_id),
            quantity: Set(movement.quantity),
            batch: Set(movement.batch.clone()),
            expiry_date: Set(movement.expiry_date),
            reference: Set(movement.reference.clone()),
            notes: Set(movement.notes.clone()),
            created_by: Set(ctx.actor_id),
            recorded_at: Set(Utc::now()),
        };

        let persisted = record.insert(conn).await.map_err(ServiceError::db_error)?;

        info!(
            movement_id = %persisted.id,
            movement_type = %persisted.movement_type,
            product_id = %persisted.product_id,
            quantity = %persisted.quantity,
            "Stock movement recorded"
        );

        Ok(persisted)
    }

    fn check_shape(&self, movement: &NewMovement) -> Result<(), ServiceError> {
        let from = movement.from_location_id;
        let to = movement.to_location_id;

        let ok = match movement.movement_type {
            MovementType::Transfer => from.is_some() && to.is_some() && from != to,
            MovementType::Purchase | MovementType::Return | MovementType::Production => {
                from.is_none() && to.is_some()
            }
            MovementType::Sale | MovementType::Consumption => from.is_some() && to.is_none(),
            MovementType::Adjustment => from.is_some() != to.is_some(),
        };

        if ok {
            Ok(())
        } else {
            Err(ServiceError::InvalidMovementShape(format!(
                "{} movement with from={:?} to={:?}",
                movement.movement_type, from, to
            )))
        }
    }

    /// Decrements a balance row through a guarded conditional update: the
    /// WHERE clause requires enough unreserved stock, so concurrent debits
    /// serialize at the storage layer and a negative balance is never
    /// persisted.
    async fn debit<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        let level = match self.find_level(conn, product_id, location_id, batch).await? {
            Some(level) => level,
            None => {
                return Err(self
                    .insufficient_stock(conn, product_id, location_id, Decimal::ZERO, quantity)
                    .await);
            }
        };

        let result = InventoryLevelEntity::update_many()
            .col_expr(
                inventory_level::Column::Quantity,
                Expr::col(inventory_level::Column::Quantity).sub(quantity),
            )
            .col_expr(
                inventory_level::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(inventory_level::Column::Id.eq(level.id))
            .filter(
                Expr::expr(
                    Expr::col(inventory_level::Column::Quantity)
                        .sub(Expr::col(inventory_level::Column::Reserved)),
                )
                .gte(quantity),
            )
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(self
                .insufficient_stock(conn, product_id, location_id, level.available(), quantity)
                .await);
        }

        Ok(())
    }

    /// Increments a balance row, creating it on first receipt.
    async fn credit<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        quantity: Decimal,
        expiry_date: Option<NaiveDate>,
    ) -> Result<(), ServiceError> {
        let level = self
            .get_or_create_level(conn, product_id, location_id, batch, expiry_date)
            .await?;

        InventoryLevelEntity::update_many()
            .col_expr(
                inventory_level::Column::Quantity,
                Expr::col(inventory_level::Column::Quantity).add(quantity),
            )
            .col_expr(
                inventory_level::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(inventory_level::Column::Id.eq(level.id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(())
    }

    /// Commits stock to an outbound order without moving it. No movement
    /// record is written: reservations are not quantity changes.
    #[instrument(skip(self, conn))]
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "reservation quantity must be positive, got {}",
                quantity
            )));
        }

        let level = match self.find_level(conn, product_id, location_id, batch).await? {
            Some(level) => level,
            None => {
                return Err(self
                    .insufficient_stock(conn, product_id, location_id, Decimal::ZERO, quantity)
                    .await);
            }
        };

        let result = InventoryLevelEntity::update_many()
            .col_expr(
                inventory_level::Column::Reserved,
                Expr::col(inventory_level::Column::Reserved).add(quantity),
            )
            .col_expr(
                inventory_level::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(inventory_level::Column::Id.eq(level.id))
            .filter(
                Expr::expr(
                    Expr::col(inventory_level::Column::Quantity)
                        .sub(Expr::col(inventory_level::Column::Reserved)),
                )
                .gte(quantity),
            )
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(self
                .insufficient_stock(conn, product_id, location_id, level.available(), quantity)
                .await);
        }

        Ok(())
    }

    /// Releases up to `quantity` of reserved stock, clamping at zero so a
    /// generous release (e.g. cancelling a partially shipped order) cannot
    /// drive `reserved` negative.
    #[instrument(skip(self, conn))]
    pub async fn release<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "release quantity must be positive, got {}",
                quantity
            )));
        }

        let Some(level) = self.find_level(conn, product_id, location_id, batch).await? else {
            return Ok(());
        };

        let full = InventoryLevelEntity::update_many()
            .col_expr(
                inventory_level::Column::Reserved,
                Expr::col(inventory_level::Column::Reserved).sub(quantity),
            )
            .col_expr(
                inventory_level::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(inventory_level::Column::Id.eq(level.id))
            .filter(inventory_level::Column::Reserved.gte(quantity))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        if full.rows_affected == 0 {
            InventoryLevelEntity::update_many()
                .col_expr(inventory_level::Column::Reserved, Expr::value(Decimal::ZERO))
                .col_expr(
                    inventory_level::Column::UpdatedAt,
                    Expr::value(Utc::now()),
                )
                .filter(inventory_level::Column::Id.eq(level.id))
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        Ok(())
    }

    /// Reserves `quantity` of a product at a location, spreading the
    /// reservation greedily across batch rows in batch order. Fails with
    /// `InsufficientStock` when the location as a whole cannot cover it.
    pub async fn reserve_at_location<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "reservation quantity must be positive, got {}",
                quantity
            )));
        }

        let levels = self.levels_at(conn, product_id, location_id).await?;
        let total_available: Decimal = levels.iter().map(|l| l.available()).sum();
        if total_available < quantity {
            return Err(self
                .insufficient_stock(conn, product_id, location_id, total_available, quantity)
                .await);
        }

        let mut remaining = quantity;
        for level in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(level.available());
            if take <= Decimal::ZERO {
                continue;
            }
            self.reserve(conn, product_id, location_id, &level.batch, take)
                .await?;
            remaining -= take;
        }

        Ok(())
    }

    /// Releases up to `quantity` of reserved stock at a location, again in
    /// batch order, clamping at zero overall.
    pub async fn release_at_location<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "release quantity must be positive, got {}",
                quantity
            )));
        }

        let mut remaining = quantity;
        for level in self.levels_at(conn, product_id, location_id).await? {
            if remaining <= Decimal::ZERO {
                break;
            }
            let give_back = remaining.min(level.reserved);
            if give_back <= Decimal::ZERO {
                continue;
            }
            self.release(conn, product_id, location_id, &level.batch, give_back)
                .await?;
            remaining -= give_back;
        }

        Ok(())
    }

    /// All balance rows of a product at one location, in batch order so
    /// repeated resolutions are deterministic.
    pub async fn levels_at<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<inventory_level::Model>, ServiceError> {
        InventoryLevelEntity::find()
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .filter(inventory_level::Column::LocationId.eq(location_id))
            .order_by_asc(inventory_level::Column::Batch)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Replays the movement log for one triple and returns the quantity it
    /// reconstructs. The replayed figure must equal the balance row; that is
    /// the correctness law of the ledger.
    pub async fn replay_quantity<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        batch: &str,
    ) -> Result<Decimal, ServiceError> {
        let movements = StockMovementEntity::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::Batch.eq(batch))
            .filter(
                stock_movement::Column::FromLocationId
                    .eq(location_id)
                    .or(stock_movement::Column::ToLocationId.eq(location_id)),
            )
            .order_by_asc(stock_movement::Column::RecordedAt)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(movements
            .iter()
            .map(|m| m.signed_effect(location_id))
            .sum())
    }

    /// Current balances for the tenant, optionally narrowed to a product,
    /// location, or batch. Read-only surface for reporting consumers.
    pub async fn list_levels(
        &self,
        ctx: TenantContext,
        filter: LevelFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<inventory_level::Model>, u64), ServiceError> {
        let db = &*self.db;

        let mut query = InventoryLevelEntity::find()
            .join(
                sea_orm::JoinType::InnerJoin,
                inventory_level::Relation::Product.def(),
            )
            .filter(product::Column::CompanyId.eq(ctx.company_id));

        if let Some(product_id) = filter.product_id {
            query = query.filter(inventory_level::Column::ProductId.eq(product_id));
        }
        if let Some(location_id) = filter.location_id {
            query = query.filter(inventory_level::Column::LocationId.eq(location_id));
        }
        if let Some(batch) = filter.batch {
            query = query.filter(inventory_level::Column::Batch.eq(batch));
        }

        let paginator = query
            .order_by_asc(inventory_level::Column::ProductId)
            .order_by_asc(inventory_level::Column::LocationId)
            .order_by_asc(inventory_level::Column::Batch)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let levels = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((levels, total))
    }

    /// Movement history for the tenant, newest first. A location filter
    /// matches either side of the movement.
    pub async fn list_movements(
        &self,
        ctx: TenantContext,
        filter: MovementFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = &*self.db;

        let mut query = StockMovementEntity::find()
            .filter(stock_movement::Column::CompanyId.eq(ctx.company_id));

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(location_id) = filter.location_id {
            query = query.filter(
                stock_movement::Column::FromLocationId
                    .eq(location_id)
                    .or(stock_movement::Column::ToLocationId.eq(location_id)),
            );
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::RecordedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let movements = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((movements, total))
    }

    /// Balance rows sitting below their product's minimum stock threshold,
    /// the reorder signal surfaced on dashboards.
    pub async fn low_stock(
        &self,
        ctx: TenantContext,
    ) -> Result<Vec<(inventory_level::Model, product::Model)>, ServiceError> {
        let db = &*self.db;

        let rows = InventoryLevelEntity::find()
            .find_also_related(ProductEntity)
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Expr::col((inventory_level::Entity, inventory_level::Column::Quantity)).lt(
                    Expr::col((product::Entity, product::Column::MinStock)),
                ),
            )
            .order_by_asc(inventory_level::Column::ProductId)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|(level, prod)| prod.map(|p| (level, p)))
            .collect())
    }

    /// Reconciles one balance row against its movement history.
    #[instrument(skip(self))]
    pub async fn audit_level(&self, level_id: Uuid) -> Result<LedgerAudit, ServiceError> {
        let db = &*self.db;

        let level = InventoryLevelEntity::find_by_id(level_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory level {} not found", level_id)))?;

        let replayed = self
            .replay_quantity(db, level.product_id, level.location_id, &level.batch)
            .await?;

        Ok(LedgerAudit {
            level_id,
            balance_quantity: level.quantity,
            replayed_quantity: replayed,
            consistent: replayed == level.quantity,
        })
    }

    /// Builds the error message clients see when a debit or reservation
    /// cannot be satisfied. Always names the product and the location.
    pub(crate) async fn insufficient_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        location_id: Uuid,
        available: Decimal,
        requested: Decimal,
    ) -> ServiceError {
        let product_name = ProductEntity::find_by_id(product_id)
            .one(conn)
            .await
            .ok()
            .flatten()
            .map(|p: product::Model| p.sku)
            .unwrap_or_else(|| product_id.to_string());

        let location_name = LocationEntity::find_by_id(location_id)
            .one(conn)
            .await
            .ok()
            .flatten()
            .map(|l: location::Model| l.code)
            .unwrap_or_else(|| location_id.to_string());

        ServiceError::InsufficientStock(format!(
            "product {} at location {}: available {}, requested {}",
            product_name, location_name, available, requested
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> StockLedgerService {
        // The shape check never touches the database.
        StockLedgerService {
            db: Arc::new(DatabaseConnection::Disconnected),
        }
    }

    fn movement(
        movement_type: MovementType,
        from: Option<Uuid>,
        to: Option<Uuid>,
    ) -> NewMovement {
        NewMovement {
            movement_type,
            product_id: Uuid::new_v4(),
            from_location_id: from,
            to_location_id: to,
            quantity: dec!(1),
            batch: String::new(),
            expiry_date: None,
            reference: None,
            notes: None,
        }
    }

    #[test]
    fn transfer_requires_both_locations() {
        let svc = ledger();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(svc
            .check_shape(&movement(MovementType::Transfer, Some(a), Some(b)))
            .is_ok());
        assert!(svc
            .check_shape(&movement(MovementType::Transfer, Some(a), None))
            .is_err());
        assert!(svc
            .check_shape(&movement(MovementType::Transfer, None, Some(b)))
            .is_err());
        // a transfer within the same location is meaningless
        assert!(svc
            .check_shape(&movement(MovementType::Transfer, Some(a), Some(a)))
            .is_err());
    }

    #[test]
    fn purchase_only_credits() {
        let svc = ledger();
        let loc = Uuid::new_v4();

        assert!(svc
            .check_shape(&movement(MovementType::Purchase, None, Some(loc)))
            .is_ok());
        assert!(svc
            .check_shape(&movement(MovementType::Purchase, Some(loc), None))
            .is_err());
        assert!(svc
            .check_shape(&movement(MovementType::Purchase, Some(loc), Some(loc)))
            .is_err());
    }

    #[test]
    fn sale_only_debits() {
        let svc = ledger();
        let loc = Uuid::new_v4();

        assert!(svc
            .check_shape(&movement(MovementType::Sale, Some(loc), None))
            .is_ok());
        assert!(svc
            .check_shape(&movement(MovementType::Sale, None, Some(loc)))
            .is_err());
        assert!(svc
            .check_shape(&movement(MovementType::Consumption, Some(loc), None))
            .is_ok());
    }

    #[test]
    fn adjustment_takes_exactly_one_side() {
        let svc = ledger();
        let loc = Uuid::new_v4();

        assert!(svc
            .check_shape(&movement(MovementType::Adjustment, Some(loc), None))
            .is_ok());
        assert!(svc
            .check_shape(&movement(MovementType::Adjustment, None, Some(loc)))
            .is_ok());
        assert!(svc
            .check_shape(&movement(MovementType::Adjustment, None, None))
            .is_err());
        assert!(svc
            .check_shape(&movement(MovementType::Adjustment, Some(loc), Some(loc)))
            .is_err());
    }
}
