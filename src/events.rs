use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the core after a workflow commits. Consumers are
/// strictly read-only with respect to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Ledger events
    StockMovementRecorded {
        movement_id: Uuid,
        company_id: Uuid,
        product_id: Uuid,
        movement_type: String,
        quantity: Decimal,
    },
    InventoryAdjusted {
        company_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
        new_quantity: Decimal,
    },

    // Purchasing events
    PurchaseOrderCreated(Uuid),
    PurchaseOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PurchaseOrderReceived {
        order_id: Uuid,
        fully_received: bool,
    },

    // Sales events
    SalesOrderCreated(Uuid),
    SalesOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    SalesOrderShipped {
        order_id: Uuid,
        shipment_id: Uuid,
        fully_shipped: bool,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        new_status: String,
    },

    // Transfer events
    TransferCreated(Uuid),
    TransferCompleted(Uuid),
    TransferCancelled(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Workflows have already committed by the time they emit, so a lost
    /// event must never surface as a workflow error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(?event, "Dropping event: {}", e);
        }
    }
}

/// Consumes events off the channel and logs them. Downstream consumers
/// (webhooks, projections) hang off this task.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "Processing event");
    }
    info!("Event channel closed; event processor shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::TransferCompleted(Uuid::new_v4()))
            .await
            .expect("send should succeed");

        assert!(matches!(
            rx.recv().await,
            Some(Event::TransferCompleted(_))
        ));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error
        sender
            .send_or_log(Event::InventoryAdjusted {
                company_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                delta: dec!(-5),
                new_quantity: dec!(10),
            })
            .await;
    }
}
