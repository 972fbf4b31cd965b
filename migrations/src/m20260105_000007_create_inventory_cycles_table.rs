use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InventoryCycles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryCycles::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryCycles::Name).string().not_null())
                    .col(
                        ColumnDef::new(InventoryCycles::Frequency)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryCycles::Classification)
                            .string_len(5)
                            .null(),
                    )
                    .col(ColumnDef::new(InventoryCycles::CategoryId).uuid().null())
                    .col(
                        ColumnDef::new(InventoryCycles::WarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryCycles::StartDate).date().not_null())
                    .col(ColumnDef::new(InventoryCycles::EndDate).date().not_null())
                    .col(ColumnDef::new(InventoryCycles::AssignedTo).uuid().null())
                    .col(ColumnDef::new(InventoryCycles::InventoryId).uuid().null())
                    .col(
                        ColumnDef::new(InventoryCycles::Status)
                            .string_len(20)
                            .not_null()
                            .default("planned"),
                    )
                    .col(ColumnDef::new(InventoryCycles::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(InventoryCycles::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryCycles::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inventory_cycles_warehouse_company")
                    .table(InventoryCycles::Table)
                    .col(InventoryCycles::WarehouseId)
                    .col(InventoryCycles::CompanyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryCycles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum InventoryCycles {
    Table,
    Id,
    Name,
    Frequency,
    Classification,
    CategoryId,
    WarehouseId,
    StartDate,
    EndDate,
    AssignedTo,
    InventoryId,
    Status,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}
