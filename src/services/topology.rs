use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        location::{self, Entity as LocationEntity},
        warehouse::{self, Entity as WarehouseEntity, WarehouseKind},
    },
    errors::ServiceError,
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct NewWarehouse {
    pub name: String,
    pub code: String,
    pub kind: WarehouseKind,
    pub address: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub name: String,
    pub code: String,
    pub aisle: Option<String>,
    pub shelf: Option<String>,
    pub bin: Option<String>,
    pub capacity: Option<Decimal>,
    pub notes: Option<String>,
}

/// The physical space stock occupies: warehouses and the locations inside
/// them.
#[derive(Clone)]
pub struct TopologyService {
    db: Arc<DatabaseConnection>,
}

impl TopologyService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new_warehouse))]
    pub async fn create_warehouse(
        &self,
        ctx: TenantContext,
        new_warehouse: NewWarehouse,
    ) -> Result<warehouse::Model, ServiceError> {
        let db = &*self.db;

        let duplicate = WarehouseEntity::find()
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .filter(warehouse::Column::Code.eq(new_warehouse.code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "warehouse code {} already exists",
                new_warehouse.code
            )));
        }

        let now = Utc::now();
        let record = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            name: Set(new_warehouse.name),
            code: Set(new_warehouse.code),
            kind: Set(new_warehouse.kind),
            address: Set(new_warehouse.address),
            contact_person: Set(new_warehouse.contact_person),
            contact_phone: Set(new_warehouse.contact_phone),
            contact_email: Set(new_warehouse.contact_email),
            is_active: Set(true),
            notes: Set(new_warehouse.notes),
            created_at: Set(now),
            updated_at: Set(now),
        };

        record.insert(db).await.map_err(ServiceError::db_error)
    }

    pub async fn get_warehouse(
        &self,
        ctx: TenantContext,
        warehouse_id: Uuid,
    ) -> Result<warehouse::Model, ServiceError> {
        WarehouseEntity::find_by_id(warehouse_id)
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))
    }

    pub async fn list_warehouses(
        &self,
        ctx: TenantContext,
    ) -> Result<Vec<warehouse::Model>, ServiceError> {
        WarehouseEntity::find()
            .filter(warehouse::Column::CompanyId.eq(ctx.company_id))
            .order_by_asc(warehouse::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Adds a location to a warehouse. Codes are unique per warehouse.
    #[instrument(skip(self, new_location))]
    pub async fn create_location(
        &self,
        ctx: TenantContext,
        warehouse_id: Uuid,
        new_location: NewLocation,
    ) -> Result<location::Model, ServiceError> {
        let db = &*self.db;
        let warehouse = self.get_warehouse(ctx, warehouse_id).await?;

        let duplicate = LocationEntity::find()
            .filter(location::Column::WarehouseId.eq(warehouse.id))
            .filter(location::Column::Code.eq(new_location.code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "location code {} already exists in warehouse {}",
                new_location.code, warehouse.code
            )));
        }

        let record = location::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse.id),
            name: Set(new_location.name),
            code: Set(new_location.code),
            aisle: Set(new_location.aisle),
            shelf: Set(new_location.shelf),
            bin: Set(new_location.bin),
            capacity: Set(new_location.capacity),
            is_active: Set(true),
            notes: Set(new_location.notes),
        };

        record.insert(db).await.map_err(ServiceError::db_error)
    }

    pub async fn list_locations(
        &self,
        ctx: TenantContext,
        warehouse_id: Uuid,
    ) -> Result<Vec<location::Model>, ServiceError> {
        let warehouse = self.get_warehouse(ctx, warehouse_id).await?;

        LocationEntity::find()
            .filter(location::Column::WarehouseId.eq(warehouse.id))
            .order_by_asc(location::Column::Code)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}
