use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItemEntity},
        stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{NewMovement, StockLedgerService},
    tenant::TenantContext,
};

/// One line of a partial receipt. Omitting `lines` on a receive call takes
/// every outstanding item in full.
#[derive(Debug, Clone)]
pub struct ReceiveLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub batch: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ReceivedLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceiveOutcome {
    pub order_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<ReceivedLine>,
}

/// Purchase receiving: turns outstanding purchase order items into ledger
/// credits at each item's destination location.
#[derive(Clone)]
pub struct ReceivingService {
    db: Arc<DatabaseConnection>,
    ledger: StockLedgerService,
    event_sender: EventSender,
}

impl ReceivingService {
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

    /// Receives stock against a purchase order. The whole call is one
    /// transaction: the ledger credits, the item updates, and the status
    /// recomputation commit together or not at all.
    #[instrument(skip(self, lines))]
    pub async fn receive(
        &self,
        ctx: TenantContext,
        order_id: Uuid,
        lines: Option<Vec<ReceiveLine>>,
    ) -> Result<ReceiveOutcome, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = PurchaseOrderEntity::find_by_id(order_id)
            .filter(purchase_order::Column::CompanyId.eq(ctx.company_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", order_id)))?;

        match order.status {
            PurchaseOrderStatus::Received => {
                return Err(ServiceError::AlreadyReceived(format!(
                    "purchase order {} is fully received",
                    order.order_number
                )));
            }
            PurchaseOrderStatus::Cancelled => {
                return Err(ServiceError::AlreadyProcessed(format!(
                    "purchase order {} is cancelled",
                    order.order_number
                )));
            }
            status if !status.is_receivable() => {
                return Err(ServiceError::InvalidStatusTransition(format!(
                    "purchase order {} is {} and cannot be received",
                    order.order_number, status
                )));
            }
            _ => {}
        }

        let items = PurchaseOrderItemEntity::find()
            .filter(purchase_order_item::Column::OrderId.eq(order.id))
            .order_by_asc(purchase_order_item::Column::Id)
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let worklist = self.build_worklist(&order, &items, lines)?;
        if worklist.is_empty() {
            return Err(ServiceError::NothingToReceive(format!(
                "all items of purchase order {} are already received",
                order.order_number
            )));
        }

        let mut received_lines = Vec::with_capacity(worklist.len());
        let mut received_by_item: Vec<(purchase_order_item::Model, Decimal)> = Vec::new();

        for (item, quantity, batch, expiry_date) in worklist {
            self.ledger
                .apply_movement(
                    &txn,
                    ctx,
                    NewMovement {
                        movement_type: MovementType::Purchase,
                        product_id: item.product_id,
                        from_location_id: None,
                        to_location_id: Some(item.location_id),
                        quantity,
                        batch,
                        expiry_date,
                        reference: Some(order.order_number.clone()),
                        notes: None,
                    },
                )
                .await?;

            let new_received = item.received + quantity;
            let mut active: purchase_order_item::ActiveModel = item.clone().into();
            active.received = Set(new_received);
            active.update(&txn).await.map_err(ServiceError::db_error)?;

            received_lines.push(ReceivedLine {
                item_id: item.id,
                product_id: item.product_id,
                location_id: item.location_id,
                quantity,
            });
            received_by_item.push((item, new_received));
        }

        // Derive the order status from the aggregate receipt state: received
        // only when no item has anything outstanding.
        let fully_received = items.iter().all(|item| {
            let received = received_by_item
                .iter()
                .find(|(updated, _)| updated.id == item.id)
                .map(|(_, new_received)| *new_received)
                .unwrap_or(item.received);
            received >= item.quantity
        });

        let new_status = if fully_received {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::Partial
        };

        if new_status != order.status {
            if !order.status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidStatusTransition(format!(
                    "purchase order {}: {} -> {}",
                    order.order_number, order.status, new_status
                )));
            }
            let mut active: purchase_order::ActiveModel = order.clone().into();
            active.status = Set(new_status);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::PurchaseOrderReceived {
                order_id: order.id,
                fully_received,
            })
            .await;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            lines = received_lines.len(),
            fully_received,
            "Purchase order received"
        );

        Ok(ReceiveOutcome {
            order_id: order.id,
            status: new_status,
            lines: received_lines,
        })
    }

    /// Pairs each receipt with its order item and the quantity to take in.
    /// With no explicit lines, every outstanding item is received in full.
    fn build_worklist(
        &self,
        order: &purchase_order::Model,
        items: &[purchase_order_item::Model],
        lines: Option<Vec<ReceiveLine>>,
    ) -> Result<Vec<(purchase_order_item::Model, Decimal, String, Option<NaiveDate>)>, ServiceError>
    {
        match lines {
            None => Ok(items
                .iter()
                .filter(|item| item.received < item.quantity)
                .map(|item| (item.clone(), item.outstanding(), String::new(), None))
                .collect()),
            Some(lines) => {
                let mut seen = std::collections::HashSet::new();
                let mut worklist = Vec::with_capacity(lines.len());
                for line in lines {
                    if !seen.insert(line.item_id) {
                        return Err(ServiceError::ValidationError(format!(
                            "item {} listed more than once in one receipt",
                            line.item_id
                        )));
                    }
                    let item = items
                        .iter()
                        .find(|item| item.id == line.item_id)
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "item {} does not belong to purchase order {}",
                                line.item_id, order.order_number
                            ))
                        })?;

                    if line.quantity <= Decimal::ZERO {
                        return Err(ServiceError::InvalidQuantity(format!(
                            "receipt quantity must be positive, got {}",
                            line.quantity
                        )));
                    }
                    if line.quantity > item.outstanding() {
                        return Err(ServiceError::ValidationError(format!(
                            "cannot receive more than ordered: ordered {}, already received {}, receiving {}",
                            item.quantity, item.received, line.quantity
                        )));
                    }

                    worklist.push((
                        item.clone(),
                        line.quantity,
                        line.batch.unwrap_or_default(),
                        line.expiry_date,
                    ));
                }
                Ok(worklist)
            }
        }
    }
}
