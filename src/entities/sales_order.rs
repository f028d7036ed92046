use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sales order lifecycle. `partial`/`shipped` are derived from the aggregate
/// shipped state of the items; `invoiced`/`completed` extend past the stock
/// side of fulfillment.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SalesOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "invoiced")]
    Invoiced,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SalesOrderStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use SalesOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Confirmed)
                | (Draft, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Partial)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Processing, Partial)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Partial, Shipped)
                | (Shipped, Invoiced)
                | (Invoiced, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Orders eligible for the shipping workflow.
    pub fn is_shippable(self) -> bool {
        matches!(self, Self::Confirmed | Self::Processing | Self::Partial)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    /// Unique per company
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: SalesOrderStatus,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::sales_order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::sales_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::SalesOrderStatus::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Draft.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Partial));
        assert!(Partial.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Invoiced));
        assert!(Invoiced.can_transition_to(Completed));
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Invoiced.can_transition_to(Cancelled));
    }

    #[test]
    fn draft_orders_are_not_shippable() {
        assert!(!Draft.is_shippable());
        assert!(Confirmed.is_shippable());
        assert!(Partial.is_shippable());
        assert!(!Shipped.is_shippable());
    }
}
