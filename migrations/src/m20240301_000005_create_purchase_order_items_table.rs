use sea_orm_migration::prelude::*;

use super::m20240301_000003_create_products_table::Products;
use super::m20240301_000004_create_purchase_orders_table::PurchaseOrders;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000005_create_purchase_order_items_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PurchaseOrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseOrderItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderItems::ProductId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderItems::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrderItems::UnitPrice)
                            .decimal()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_order_items_order_id")
                            .from(
                                PurchaseOrderItems::Table,
                                PurchaseOrderItems::PurchaseOrderId,
                            )
                            .to(PurchaseOrders::Table, PurchaseOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_order_items_product_id")
                            .from(PurchaseOrderItems::Table, PurchaseOrderItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_order_items_order_id")
                    .table(PurchaseOrderItems::Table)
                    .col(PurchaseOrderItems::PurchaseOrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_order_items_product_id")
                    .table(PurchaseOrderItems::Table)
                    .col(PurchaseOrderItems::ProductId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PurchaseOrderItems {
    Table,
    Id,
    PurchaseOrderId,
    ProductId,
    Quantity,
    UnitPrice,
}
