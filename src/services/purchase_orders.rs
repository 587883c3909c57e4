use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        purchase_order::{self, Entity as PurchaseOrder, STATUS_PENDING},
        purchase_order_item::{self, Entity as PurchaseOrderItem},
        vendor::{self, Entity as Vendor},
    },
    errors::ServiceError,
    services::products::ensure_valid_unit_price,
};

/// Requested line on a new order; the price comes from the catalog
#[derive(Debug, Clone, Copy)]
pub struct OrderLineInput {
    pub product_id: i32,
    pub quantity: i32,
}

/// Replacement line on an updated order, priced by the caller
#[derive(Debug, Clone, Copy)]
pub struct PricedLineInput {
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreatePurchaseOrder {
    pub vendor_id: i32,
    pub items: Vec<OrderLineInput>,
}

#[derive(Debug, Clone)]
pub struct UpdatePurchaseOrder {
    pub vendor_id: i32,
    /// Kept unchanged when absent or blank
    pub status: Option<String>,
    pub items: Vec<PricedLineInput>,
}

/// Order with vendor and product names resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrderView {
    pub id: i32,
    pub vendor_id: i32,
    pub vendor_name: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: String,
    pub items: Vec<PurchaseOrderItemView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrderItemView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Sum of quantity times unit price over every line.
pub fn order_total<'a>(lines: impl IntoIterator<Item = &'a (i32, Decimal)>) -> Decimal {
    lines
        .into_iter()
        .map(|(quantity, unit_price)| *unit_price * Decimal::from(*quantity))
        .sum()
}

fn ensure_lines_present(count: usize) -> Result<(), ServiceError> {
    if count == 0 {
        return Err(ServiceError::ValidationError(
            "A purchase order requires at least one item".to_string(),
        ));
    }
    Ok(())
}

fn ensure_positive_quantity(product_id: i32, quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "Quantity for product {} must be greater than zero",
            product_id
        )));
    }
    Ok(())
}

/// Purchase-order workflow: vendor and product resolution, price capture,
/// total computation and all-or-nothing persistence of order plus items
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl PurchaseOrderService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    /// Creates a Pending order. Each line captures the product's current
    /// unit price; later catalog edits do not touch it.
    #[instrument(skip(self, command), fields(vendor_id = command.vendor_id, lines = command.items.len()))]
    pub async fn create(
        &self,
        command: CreatePurchaseOrder,
    ) -> Result<PurchaseOrderView, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let vendor = find_vendor(&txn, command.vendor_id).await?;

        ensure_lines_present(command.items.len())?;
        for line in &command.items {
            ensure_positive_quantity(line.product_id, line.quantity)?;
        }

        let products =
            load_products(&txn, command.items.iter().map(|line| line.product_id)).await?;

        let priced: Vec<(i32, i32, Decimal)> = command
            .items
            .iter()
            .map(|line| {
                let price = products[&line.product_id].unit_price;
                (line.product_id, line.quantity, price)
            })
            .collect();
        let total = order_total(&totals_input(&priced));

        let order = purchase_order::ActiveModel {
            vendor_id: Set(vendor.id),
            order_date: Set(Utc::now()),
            total_amount: Set(total),
            status: Set(STATUS_PENDING.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let items = insert_lines(&txn, order.id, &priced).await?;

        txn.commit().await?;

        slog::info!(self.logger, "Purchase order created";
            "order_id" => order.id,
            "vendor_id" => vendor.id,
            "lines" => items.len(),
            "total" => %order.total_amount,
        );

        Ok(build_view(order, &vendor, items, &products))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<PurchaseOrderView, ServiceError> {
        let db = &*self.db_pool;

        let (order, vendor) = PurchaseOrder::find_by_id(id)
            .find_also_related(Vendor)
            .one(db)
            .await?
            .ok_or_else(|| order_not_found(id))?;

        let mut views = self.resolve(db, vec![(order, vendor)]).await?;
        views.pop().ok_or_else(|| order_not_found(id))
    }

    /// Every order, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<PurchaseOrderView>, ServiceError> {
        let db = &*self.db_pool;

        let orders = PurchaseOrder::find()
            .find_also_related(Vendor)
            .order_by_desc(purchase_order::Column::OrderDate)
            .order_by_desc(purchase_order::Column::Id)
            .all(db)
            .await?;

        self.resolve(db, orders).await
    }

    /// Replaces vendor, items and (when supplied) status. Line prices are
    /// taken from the caller as given, which allows manual price corrections.
    #[instrument(skip(self, command), fields(vendor_id = command.vendor_id, lines = command.items.len()))]
    pub async fn update(
        &self,
        id: i32,
        command: UpdatePurchaseOrder,
    ) -> Result<PurchaseOrderView, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = PurchaseOrder::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(id))?;

        let vendor = find_vendor(&txn, command.vendor_id).await?;

        ensure_lines_present(command.items.len())?;
        for line in &command.items {
            ensure_positive_quantity(line.product_id, line.quantity)?;
            ensure_valid_unit_price(&line.unit_price, &format!("product {}", line.product_id))?;
        }

        let products =
            load_products(&txn, command.items.iter().map(|line| line.product_id)).await?;

        PurchaseOrderItem::delete_many()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
            .exec(&txn)
            .await?;

        let priced: Vec<(i32, i32, Decimal)> = command
            .items
            .iter()
            .map(|line| (line.product_id, line.quantity, line.unit_price))
            .collect();
        let items = insert_lines(&txn, id, &priced).await?;
        let total = order_total(&totals_input(&priced));

        let previous_status = order.status.clone();
        let mut active: purchase_order::ActiveModel = order.into();
        active.vendor_id = Set(vendor.id);
        active.total_amount = Set(total);
        if let Some(status) = command
            .status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
        {
            active.status = Set(status.to_string());
        }
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        slog::info!(self.logger, "Purchase order updated";
            "order_id" => id,
            "vendor_id" => vendor.id,
            "lines" => items.len(),
            "total" => %updated.total_amount,
            "status_from" => previous_status,
            "status_to" => &updated.status,
        );

        Ok(build_view(updated, &vendor, items, &products))
    }

    /// Removes the order's items and then the order in one transaction.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        PurchaseOrder::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(id))?;

        let removed = PurchaseOrderItem::delete_many()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
            .exec(&txn)
            .await?;
        PurchaseOrder::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        slog::info!(self.logger, "Purchase order deleted"; "order_id" => id, "lines" => removed.rows_affected);
        Ok(())
    }

    /// Loads items and products for a batch of orders with two queries.
    async fn resolve<C: ConnectionTrait>(
        &self,
        conn: &C,
        orders: Vec<(purchase_order::Model, Option<vendor::Model>)>,
    ) -> Result<Vec<PurchaseOrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = orders.iter().map(|(order, _)| order.id).collect();
        let rows = PurchaseOrderItem::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.is_in(order_ids))
            .find_also_related(Product)
            .order_by_asc(purchase_order_item::Column::Id)
            .all(conn)
            .await?;

        let mut lines: HashMap<i32, Vec<PurchaseOrderItemView>> = HashMap::new();
        for (item, product) in rows {
            lines
                .entry(item.purchase_order_id)
                .or_default()
                .push(PurchaseOrderItemView {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: product.map(|p| p.name).unwrap_or_default(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                });
        }

        Ok(orders
            .into_iter()
            .map(|(order, vendor)| PurchaseOrderView {
                items: lines.remove(&order.id).unwrap_or_default(),
                id: order.id,
                vendor_id: order.vendor_id,
                vendor_name: vendor.map(|v| v.name).unwrap_or_default(),
                order_date: order.order_date,
                total_amount: order.total_amount,
                status: order.status,
            })
            .collect())
    }
}

fn order_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Purchase order with ID {} not found", id))
}

async fn find_vendor(txn: &DatabaseTransaction, vendor_id: i32) -> Result<vendor::Model, ServiceError> {
    Vendor::find_by_id(vendor_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Vendor with ID {} not found", vendor_id)))
}

/// Loads every referenced product, reporting all missing ids together.
async fn load_products(
    txn: &DatabaseTransaction,
    product_ids: impl Iterator<Item = i32>,
) -> Result<HashMap<i32, product::Model>, ServiceError> {
    let wanted: BTreeSet<i32> = product_ids.collect();

    let found: HashMap<i32, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(wanted.iter().copied()))
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let missing: Vec<String> = wanted
        .iter()
        .filter(|id| !found.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Products not found: {}",
            missing.join(", ")
        )));
    }

    Ok(found)
}

async fn insert_lines(
    txn: &DatabaseTransaction,
    order_id: i32,
    lines: &[(i32, i32, Decimal)],
) -> Result<Vec<purchase_order_item::Model>, ServiceError> {
    let mut inserted = Vec::with_capacity(lines.len());
    for &(product_id, quantity, unit_price) in lines {
        let item = purchase_order_item::ActiveModel {
            purchase_order_id: Set(order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price: Set(unit_price),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        inserted.push(item);
    }
    Ok(inserted)
}

fn totals_input(lines: &[(i32, i32, Decimal)]) -> Vec<(i32, Decimal)> {
    lines
        .iter()
        .map(|&(_, quantity, unit_price)| (quantity, unit_price))
        .collect()
}

fn build_view(
    order: purchase_order::Model,
    vendor: &vendor::Model,
    items: Vec<purchase_order_item::Model>,
    products: &HashMap<i32, product::Model>,
) -> PurchaseOrderView {
    PurchaseOrderView {
        id: order.id,
        vendor_id: order.vendor_id,
        vendor_name: vendor.name.clone(),
        order_date: order.order_date,
        total_amount: order.total_amount,
        status: order.status,
        items: items
            .into_iter()
            .map(|item| PurchaseOrderItemView {
                id: item.id,
                product_name: products
                    .get(&item.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_is_sum_of_quantity_times_price() {
        let lines = vec![(2, dec!(12.50)), (1, dec!(4.25)), (10, dec!(0.10))];
        assert_eq!(order_total(&lines), dec!(30.25));
    }

    #[test]
    fn total_of_no_lines_is_zero() {
        let lines: Vec<(i32, Decimal)> = Vec::new();
        assert_eq!(order_total(&lines), Decimal::ZERO);
    }

    #[test]
    fn empty_orders_and_non_positive_quantities_are_rejected() {
        assert!(matches!(
            ensure_lines_present(0),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(ensure_lines_present(1).is_ok());
        assert!(matches!(
            ensure_positive_quantity(3, 0),
            Err(ServiceError::ValidationError(msg)) if msg.contains('3')
        ));
    }
}
