use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;
use crate::services::{
    adjustments::AdjustmentService, catalog::CatalogService, ledger::StockLedgerService,
    purchasing::PurchasingService, receiving::ReceivingService, sales::SalesService,
    shipping::ShippingService, topology::TopologyService, transfers::TransferService,
};

pub mod common;
pub mod inventory;
pub mod products;
pub mod purchase_orders;
pub mod sales_orders;
pub mod shipments;
pub mod transfers;
pub mod warehouses;

pub use crate::AppState;

/// Every service the HTTP layer dispatches into, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: StockLedgerService,
    pub receiving: ReceivingService,
    pub shipping: ShippingService,
    pub transfers: TransferService,
    pub adjustments: AdjustmentService,
    pub purchasing: PurchasingService,
    pub sales: SalesService,
    pub catalog: CatalogService,
    pub topology: TopologyService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        let ledger = StockLedgerService::new(db.clone());
        let sales = SalesService::new(db.clone(), ledger.clone(), event_sender.clone());

        Self {
            ledger: ledger.clone(),
            receiving: ReceivingService::new(db.clone(), ledger.clone(), event_sender.clone()),
            shipping: ShippingService::new(
                db.clone(),
                ledger.clone(),
                sales.clone(),
                event_sender.clone(),
            ),
            transfers: TransferService::new(db.clone(), ledger.clone(), event_sender.clone()),
            adjustments: AdjustmentService::new(db.clone(), ledger, event_sender.clone()),
            purchasing: PurchasingService::new(db.clone(), event_sender),
            sales,
            catalog: CatalogService::new(db.clone()),
            topology: TopologyService::new(db),
        }
    }
}
