use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMovements::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::Reference)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::MovementType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockMovements::LotId).uuid().null())
                    .col(
                        ColumnDef::new(StockMovements::SourceLocationId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::DestinationLocationId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::Quantity)
                            .decimal_len(12, 3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::UnitCost)
                            .decimal_len(12, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(StockMovements::Reason).text().null())
                    .col(ColumnDef::new(StockMovements::Notes).text().null())
                    .col(ColumnDef::new(StockMovements::ValidatedBy).uuid().null())
                    .col(
                        ColumnDef::new(StockMovements::ValidatedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(StockMovements::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMovements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_movements_product_company")
                    .table(StockMovements::Table)
                    .col(StockMovements::ProductId)
                    .col(StockMovements::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_movements_status")
                    .table(StockMovements::Table)
                    .col(StockMovements::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockMovements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockMovements {
    Table,
    Id,
    Reference,
    MovementType,
    ProductId,
    LotId,
    SourceLocationId,
    DestinationLocationId,
    Quantity,
    UnitCost,
    Status,
    Reason,
    Notes,
    ValidatedBy,
    ValidatedAt,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}
