use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000002_create_vendors_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vendors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vendors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vendors::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Vendors::Address).string_len(255).null())
                    .col(ColumnDef::new(Vendors::ContactPerson).string_len(100).null())
                    .col(ColumnDef::new(Vendors::Phone).string_len(50).null())
                    .col(ColumnDef::new(Vendors::Email).string_len(100).null())
                    .col(ColumnDef::new(Vendors::NameKey).string_len(100).not_null())
                    .col(ColumnDef::new(Vendors::EmailKey).string_len(100).null())
                    .col(ColumnDef::new(Vendors::SearchText).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vendors_name")
                    .table(Vendors::Table)
                    .col(Vendors::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vendors_name_key")
                    .table(Vendors::Table)
                    .col(Vendors::NameKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // NULL keys never collide, so vendors without email are unconstrained
        manager
            .create_index(
                Index::create()
                    .name("idx_vendors_email_key")
                    .table(Vendors::Table)
                    .col(Vendors::EmailKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vendors::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Vendors {
    Table,
    Id,
    Name,
    Address,
    ContactPerson,
    Phone,
    Email,
    NameKey,
    EmailKey,
    SearchText,
}
