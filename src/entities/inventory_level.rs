use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized stock balance for one (product, location, batch) triple.
///
/// Rows are created lazily on the first movement into the triple and are
/// never deleted, even at zero quantity, so the movement history always has
/// a balance row to reconcile against. Invariants maintained by the ledger:
/// `quantity >= 0` and `0 <= reserved <= quantity`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_levels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    /// Lot/batch grouping; empty string for unbatched stock. Part of the
    /// unique key with product and location.
    pub batch: String,
    pub quantity: Decimal,
    pub reserved: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Stock not committed to an outbound order.
    pub fn available(&self) -> Decimal {
        self.quantity - self.reserved
    }
}
