use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unit of measure a product is stocked and sold in.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    #[sea_orm(string_value = "pc")]
    Piece,
    #[sea_orm(string_value = "kg")]
    Kilogram,
    #[sea_orm(string_value = "g")]
    Gram,
    #[sea_orm(string_value = "l")]
    Liter,
    #[sea_orm(string_value = "ml")]
    Milliliter,
    #[sea_orm(string_value = "m")]
    Meter,
    #[sea_orm(string_value = "cm")]
    Centimeter,
    #[sea_orm(string_value = "box")]
    Box,
    #[sea_orm(string_value = "pack")]
    Pack,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    /// Unique per company
    pub sku: String,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: UnitOfMeasure,
    pub description: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub tax_rate: Decimal,
    /// Reorder signal thresholds
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_category::Entity",
        from = "Column::CategoryId",
        to = "super::product_category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::inventory_level::Entity")]
    InventoryLevels,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    Movements,
}

impl Related<super::product_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::inventory_level::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLevels.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
