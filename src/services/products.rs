use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use slog::Logger;
use tracing::instrument;

use crate::{
    db::DbPool,
    entities::{
        product::{self, Column as ProductColumn, Entity as Product},
        purchase_order_item::{self, Entity as PurchaseOrderItem},
    },
    errors::ServiceError,
};

pub const MIN_UNIT_PRICE: Decimal = dec!(0.01);
pub const MAX_UNIT_PRICE: Decimal = dec!(999999.99);
/// Prices are whole cents.
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// True for prices between the bounds with at most two decimal places.
pub fn is_valid_unit_price(price: &Decimal) -> bool {
    *price >= MIN_UNIT_PRICE
        && *price <= MAX_UNIT_PRICE
        && price.normalize().scale() <= PRICE_DECIMAL_PLACES
}

pub(crate) fn ensure_valid_unit_price(price: &Decimal, owner: &str) -> Result<(), ServiceError> {
    if is_valid_unit_price(price) {
        return Ok(());
    }
    Err(ServiceError::ValidationError(format!(
        "Unit price {} for {} must be between {} and {} with at most {} decimal places",
        price, owner, MIN_UNIT_PRICE, MAX_UNIT_PRICE, PRICE_DECIMAL_PLACES
    )))
}

/// Fields accepted when creating or replacing a product
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub code: String,
    pub unit: Option<String>,
    pub unit_price: Decimal,
}

/// Product catalog: CRUD with a unique code and an in-use deletion guard
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find()
            .order_by_asc(ProductColumn::Name)
            .all(&*self.db_pool)
            .await?;
        slog::debug!(self.logger, "Listed products"; "count" => products.len());
        Ok(products)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<product::Model>, ServiceError> {
        Ok(Product::find_by_id(id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, id: i32) -> Result<bool, ServiceError> {
        let count = Product::find()
            .filter(ProductColumn::Id.eq(id))
            .count(&*self.db_pool)
            .await?;
        Ok(count > 0)
    }

    /// Inserts a product; the code must not be used by any other product.
    #[instrument(skip(self))]
    pub async fn create(&self, input: ProductInput) -> Result<product::Model, ServiceError> {
        ensure_valid_unit_price(&input.unit_price, &format!("product '{}'", input.code))?;
        let txn = self.db_pool.begin().await?;

        let taken = Product::find()
            .filter(ProductColumn::Code.eq(input.code.as_str()))
            .one(&txn)
            .await?;
        if taken.is_some() {
            slog::warn!(self.logger, "Duplicate product code"; "code" => &input.code);
            return Err(ServiceError::ValidationError(duplicate_code_message(
                &input.code,
            )));
        }

        let created = product::ActiveModel {
            name: Set(input.name),
            code: Set(input.code.clone()),
            unit: Set(input.unit),
            unit_price: Set(input.unit_price),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_write_error(e, duplicate_code_message(&input.code)))?;

        txn.commit().await?;

        slog::info!(self.logger, "Product created"; "product_id" => created.id, "code" => &created.code);
        Ok(created)
    }

    /// Overwrites every mutable field of an existing product.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i32,
        input: ProductInput,
    ) -> Result<product::Model, ServiceError> {
        ensure_valid_unit_price(&input.unit_price, &format!("product '{}'", input.code))?;
        let txn = self.db_pool.begin().await?;

        let existing = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product with ID {} not found", id)))?;

        let taken = Product::find()
            .filter(ProductColumn::Code.eq(input.code.as_str()))
            .filter(ProductColumn::Id.ne(id))
            .one(&txn)
            .await?;
        if taken.is_some() {
            slog::warn!(self.logger, "Duplicate product code on update"; "product_id" => id, "code" => &input.code);
            return Err(ServiceError::ValidationError(duplicate_code_message(
                &input.code,
            )));
        }

        let mut active: product::ActiveModel = existing.into();
        active.name = Set(input.name);
        active.code = Set(input.code.clone());
        active.unit = Set(input.unit);
        active.unit_price = Set(input.unit_price);
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_error(e, duplicate_code_message(&input.code)))?;

        txn.commit().await?;

        slog::info!(self.logger, "Product updated"; "product_id" => id);
        Ok(updated)
    }

    /// `Ok(false)` when the product does not exist; a validation error while
    /// any purchase-order line still references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let Some(existing) = Product::find_by_id(id).one(&txn).await? else {
            slog::warn!(self.logger, "Product not found for deletion"; "product_id" => id);
            return Ok(false);
        };

        let references = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::ProductId.eq(id))
            .count(&txn)
            .await?;
        if references > 0 {
            slog::warn!(self.logger, "Product in use"; "product_id" => id, "order_lines" => references);
            return Err(ServiceError::ValidationError(format!(
                "Cannot delete product '{}' because it is used in purchase orders",
                existing.code
            )));
        }

        Product::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        slog::info!(self.logger, "Product deleted"; "product_id" => id);
        Ok(true)
    }
}

fn duplicate_code_message(code: &str) -> String {
    format!("Product code '{}' already exists", code)
}
