use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// Purchase order lifecycle. The receiving side (`partial`/`received`) is
/// derived from the aggregate receipt state of the items, never set
/// independently.
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
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "ordered")]
    Ordered,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Legal edges of the state machine. Self-transitions are not edges;
    /// callers skip the update when the derived status is unchanged.
    pub fn can_transition_to(self, next: Self) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Draft, Cancelled)
                | (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Ordered)
                | (Approved, Partial)
                | (Approved, Received)
                | (Approved, Cancelled)
                | (Ordered, Partial)
                | (Ordered, Received)
                | (Ordered, Cancelled)
                | (Partial, Received)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Received | Self::Cancelled)
    }

    /// Orders eligible for the receiving workflow.
    pub fn is_receivable(self) -> bool {
        matches!(self, Self::Approved | Self::Ordered | Self::Partial)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    /// Unique per company
    pub order_number: String,
    pub supplier_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PurchaseOrderStatus::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Ordered));
        assert!(Ordered.can_transition_to(Partial));
        assert!(Partial.can_transition_to(Received));
        assert!(Ordered.can_transition_to(Received));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [Draft, Pending, Approved, Ordered, Partial, Received, Cancelled] {
            assert!(!Received.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn receipt_cannot_skip_approval() {
        assert!(!Draft.can_transition_to(Received));
        assert!(!Pending.can_transition_to(Partial));
        assert!(!Draft.is_receivable());
        assert!(Ordered.is_receivable());
    }
}
