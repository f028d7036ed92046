use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        location::Entity as LocationEntity,
        product::{self, Entity as ProductEntity},
        stock_movement::{self, MovementType},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{NewMovement, StockLedgerService},
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub batch: String,
    /// Positive adds stock, negative removes it. Zero is rejected; no-op
    /// movements are never recorded.
    pub delta: Decimal,
    pub notes: Option<String>,
}

/// Manual stock corrections: a signed delta against one balance row,
/// recorded as an adjustment movement.
#[derive(Clone)]
pub struct AdjustmentService {
    db: Arc<DatabaseConnection>,
    ledger: StockLedgerService,
    event_sender: EventSender,
}

impl AdjustmentService {
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

    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        ctx: TenantContext,
        request: AdjustmentRequest,
    ) -> Result<stock_movement::Model, ServiceError> {
        if request.delta == Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(
                "adjustment delta must be non-zero".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        // Both references must exist and belong to the tenant before any
        // balance is touched.
        ProductEntity::find_by_id(request.product_id)
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;

        let loc = LocationEntity::find_by_id(request.location_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Location {} not found", request.location_id))
            })?;
        WarehouseEntity::find_by_id(loc.warehouse_id)
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Location {} not found", request.location_id))
            })?;

        let (from, to) = if request.delta > Decimal::ZERO {
            (None, Some(request.location_id))
        } else {
            (Some(request.location_id), None)
        };

        let movement = self
            .ledger
            .apply_movement(
                &txn,
                ctx,
                NewMovement {
                    movement_type: MovementType::Adjustment,
                    product_id: request.product_id,
                    from_location_id: from,
                    to_location_id: to,
                    quantity: request.delta.abs(),
                    batch: request.batch.clone(),
                    expiry_date: None,
                    reference: None,
                    notes: request.notes.clone(),
                },
            )
            .await?;

        let new_quantity = self
            .ledger
            .find_level(&txn, request.product_id, request.location_id, &request.batch)
            .await?
            .map(|level| level.quantity)
            .unwrap_or(Decimal::ZERO);

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::InventoryAdjusted {
                company_id: ctx.company_id,
                product_id: request.product_id,
                location_id: request.location_id,
                delta: request.delta,
                new_quantity,
            })
            .await;

        info!(
            product_id = %request.product_id,
            location_id = %request.location_id,
            delta = %request.delta,
            new_quantity = %new_quantity,
            "Inventory adjusted"
        );

        Ok(movement)
    }
}
