use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Inventories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inventories::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Inventories::Reference)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Inventories::Name).string().not_null())
                    .col(ColumnDef::new(Inventories::WarehouseId).uuid().not_null())
                    .col(
                        ColumnDef::new(Inventories::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Inventories::StartedAt).timestamp().null())
                    .col(ColumnDef::new(Inventories::CompletedAt).timestamp().null())
                    .col(ColumnDef::new(Inventories::Notes).text().null())
                    .col(ColumnDef::new(Inventories::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(Inventories::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Inventories::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Inventories::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryLines::InventoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryLines::ProductId).uuid().not_null())
                    .col(ColumnDef::new(InventoryLines::LocationId).uuid().not_null())
                    .col(ColumnDef::new(InventoryLines::LotId).uuid().null())
                    .col(
                        ColumnDef::new(InventoryLines::ExpectedQuantity)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryLines::CountedQuantity)
                            .decimal_len(12, 3)
                            .null(),
                    )
                    .col(ColumnDef::new(InventoryLines::Notes).text().null())
                    .col(
                        ColumnDef::new(InventoryLines::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryLines::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inventory_lines_inventory")
                    .table(InventoryLines::Table)
                    .col(InventoryLines::InventoryId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Inventories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Inventories {
    Table,
    Id,
    Reference,
    Name,
    WarehouseId,
    Status,
    StartedAt,
    CompletedAt,
    Notes,
    CreatedBy,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InventoryLines {
    Table,
    Id,
    InventoryId,
    ProductId,
    LocationId,
    LotId,
    ExpectedQuantity,
    CountedQuantity,
    Notes,
    CreatedAt,
    UpdatedAt,
}
