use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use uuid::Uuid;

/// What kind of quantity change a movement records. Direction is carried by
/// which location columns are populated, never by the sign of the quantity.
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
pub enum MovementType {
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "production")]
    Production,
    #[sea_orm(string_value = "consumption")]
    Consumption,
}

/// One immutable ledger entry. The set of movements for a (product,
/// location, batch), replayed in `recorded_at` order, reconstructs the
/// balance row exactly; this table is the system of record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub movement_type: MovementType,
    pub product_id: Uuid,
    /// Set when stock leaves a location. A transfer sets both; every other
    /// type sets exactly one of from/to.
    pub from_location_id: Option<Uuid>,
    /// Set when stock enters a location.
    pub to_location_id: Option<Uuid>,
    /// Always a positive magnitude.
    pub quantity: Decimal,
    pub batch: String,
    pub expiry_date: Option<NaiveDate>,
    /// Free-text pointer at the driving document (order number, transfer
    /// reference, adjustment note tag).
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Signed effect of this movement on the balance at `location_id`:
    /// positive into the location, negative out of it, zero if the movement
    /// does not touch it.
    pub fn signed_effect(&self, location_id: Uuid) -> Decimal {
        let mut effect = Decimal::ZERO;
        if self.to_location_id == Some(location_id) {
            effect += self.quantity;
        }
        if self.from_location_id == Some(location_id) {
            effect -= self.quantity;
        }
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn movement(from: Option<Uuid>, to: Option<Uuid>, qty: Decimal) -> Model {
        Model {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            movement_type: MovementType::Transfer,
            product_id: Uuid::new_v4(),
            from_location_id: from,
            to_location_id: to,
            quantity: qty,
            batch: String::new(),
            expiry_date: None,
            reference: None,
            notes: None,
            created_by: Uuid::new_v4(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn signed_effect_is_directional() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let m = movement(Some(a), Some(b), dec!(20));

        assert_eq!(m.signed_effect(a), dec!(-20));
        assert_eq!(m.signed_effect(b), dec!(20));
        assert_eq!(m.signed_effect(Uuid::new_v4()), dec!(0));
    }
}
