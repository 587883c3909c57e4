use sea_orm_migration::prelude::*;

use super::m20240301_000002_create_vendors_table::Vendors;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000004_create_purchase_orders_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PurchaseOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseOrders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PurchaseOrders::VendorId).integer().not_null())
                    .col(
                        ColumnDef::new(PurchaseOrders::OrderDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::TotalAmount)
                            .decimal()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PurchaseOrders::Status)
                            .string_len(50)
                            .not_null()
                            .default("Pending"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_orders_vendor_id")
                            .from(PurchaseOrders::Table, PurchaseOrders::VendorId)
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_orders_vendor_id")
                    .table(PurchaseOrders::Table)
                    .col(PurchaseOrders::VendorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PurchaseOrders {
    Table,
    Id,
    VendorId,
    OrderDate,
    TotalAmount,
    Status,
}
