use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        customer::{self, CustomerKind, Entity as CustomerEntity},
        product::{self, Entity as ProductEntity, UnitOfMeasure},
        product_category::{self, Entity as ProductCategoryEntity},
        supplier::{self, Entity as SupplierEntity},
    },
    errors::ServiceError,
    tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit: UnitOfMeasure,
    pub description: Option<String>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub tax_rate: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
}

/// Descriptive and pricing fields only. SKU and unit are fixed at creation:
/// historical movements reference the product and must keep meaning.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub name: String,
    pub code: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub payment_terms: Option<String>,
    pub lead_time_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub kind: CustomerKind,
    pub name: String,
    pub code: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub payment_terms: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub notes: Option<String>,
}

/// Reference data every workflow reads and none mutates: products,
/// categories, suppliers, customers.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new_product))]
    pub async fn create_product(
        &self,
        ctx: TenantContext,
        new_product: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db;

        let duplicate = ProductEntity::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .filter(product::Column::Sku.eq(new_product.sku.clone()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} already exists",
                new_product.sku
            )));
        }

        if let Some(category_id) = new_product.category_id {
            self.category_of_company(ctx, category_id).await?;
        }

        let now = Utc::now();
        let record = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            name: Set(new_product.name),
            sku: Set(new_product.sku),
            barcode: Set(new_product.barcode),
            category_id: Set(new_product.category_id),
            unit: Set(new_product.unit),
            description: Set(new_product.description),
            purchase_price: Set(new_product.purchase_price),
            selling_price: Set(new_product.selling_price),
            tax_rate: Set(new_product.tax_rate),
            min_stock: Set(new_product.min_stock),
            max_stock: Set(new_product.max_stock),
            weight: Set(new_product.weight),
            volume: Set(new_product.volume),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        record.insert(db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        ctx: TenantContext,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db;
        let existing = self.get_product(ctx, product_id).await?;

        if let Some(category_id) = patch.category_id {
            self.category_of_company(ctx, category_id).await?;
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(barcode) = patch.barcode {
            active.barcode = Set(Some(barcode));
        }
        if let Some(category_id) = patch.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(purchase_price) = patch.purchase_price {
            active.purchase_price = Set(purchase_price);
        }
        if let Some(selling_price) = patch.selling_price {
            active.selling_price = Set(selling_price);
        }
        if let Some(tax_rate) = patch.tax_rate {
            active.tax_rate = Set(tax_rate);
        }
        if let Some(min_stock) = patch.min_stock {
            active.min_stock = Set(min_stock);
        }
        if let Some(max_stock) = patch.max_stock {
            active.max_stock = Set(Some(max_stock));
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        active.update(db).await.map_err(ServiceError::db_error)
    }

    pub async fn get_product(
        &self,
        ctx: TenantContext,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    pub async fn list_products(
        &self,
        ctx: TenantContext,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let paginator = ProductEntity::find()
            .filter(product::Column::CompanyId.eq(ctx.company_id))
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((products, total))
    }

    #[instrument(skip(self, category))]
    pub async fn create_category(
        &self,
        ctx: TenantContext,
        category: NewCategory,
    ) -> Result<product_category::Model, ServiceError> {
        if let Some(parent_id) = category.parent_id {
            self.category_of_company(ctx, parent_id).await?;
        }

        let record = product_category::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            name: Set(category.name),
            parent_id: Set(category.parent_id),
            description: Set(category.description),
            is_active: Set(true),
        };

        record.insert(&*self.db).await.map_err(ServiceError::db_error)
    }

    pub async fn list_categories(
        &self,
        ctx: TenantContext,
    ) -> Result<Vec<product_category::Model>, ServiceError> {
        ProductCategoryEntity::find()
            .filter(product_category::Column::CompanyId.eq(ctx.company_id))
            .order_by_asc(product_category::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, new_supplier))]
    pub async fn create_supplier(
        &self,
        ctx: TenantContext,
        new_supplier: NewSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        let record = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            name: Set(new_supplier.name),
            code: Set(new_supplier.code),
            contact_person: Set(new_supplier.contact_person),
            phone: Set(new_supplier.phone),
            email: Set(new_supplier.email),
            address: Set(new_supplier.address),
            tax_id: Set(new_supplier.tax_id),
            payment_terms: Set(new_supplier.payment_terms),
            lead_time_days: Set(new_supplier.lead_time_days),
            notes: Set(new_supplier.notes),
            is_active: Set(true),
        };

        record.insert(&*self.db).await.map_err(ServiceError::db_error)
    }

    pub async fn list_suppliers(
        &self,
        ctx: TenantContext,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        SupplierEntity::find()
            .filter(supplier::Column::CompanyId.eq(ctx.company_id))
            .order_by_asc(supplier::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, new_customer))]
    pub async fn create_customer(
        &self,
        ctx: TenantContext,
        new_customer: NewCustomer,
    ) -> Result<customer::Model, ServiceError> {
        let record = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(ctx.company_id),
            kind: Set(new_customer.kind),
            name: Set(new_customer.name),
            code: Set(new_customer.code),
            contact_person: Set(new_customer.contact_person),
            phone: Set(new_customer.phone),
            email: Set(new_customer.email),
            address: Set(new_customer.address),
            tax_id: Set(new_customer.tax_id),
            payment_terms: Set(new_customer.payment_terms),
            credit_limit: Set(new_customer.credit_limit),
            notes: Set(new_customer.notes),
            is_active: Set(true),
        };

        record.insert(&*self.db).await.map_err(ServiceError::db_error)
    }

    pub async fn list_customers(
        &self,
        ctx: TenantContext,
    ) -> Result<Vec<customer::Model>, ServiceError> {
        CustomerEntity::find()
            .filter(customer::Column::CompanyId.eq(ctx.company_id))
            .order_by_asc(customer::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn category_of_company(
        &self,
        ctx: TenantContext,
        category_id: Uuid,
    ) -> Result<product_category::Model, ServiceError> {
        ProductCategoryEntity::find_by_id(category_id)
            .filter(product_category::Column::CompanyId.eq(ctx.company_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }
}
