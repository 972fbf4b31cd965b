use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockLevels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockLevels::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockLevels::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockLevels::LocationId).uuid().not_null())
                    .col(ColumnDef::new(StockLevels::LotId).uuid().null())
                    .col(
                        ColumnDef::new(StockLevels::Quantity)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockLevels::ReservedQuantity)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(StockLevels::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(StockLevels::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(StockLevels::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        // NULL lot_id rows are distinct keys; the partial uniqueness for them is
        // enforced by the lazy get-or-create path running under row locks.
        manager
            .create_index(
                Index::create()
                    .name("uq_stock_levels_product_location_lot")
                    .table(StockLevels::Table)
                    .col(StockLevels::ProductId)
                    .col(StockLevels::LocationId)
                    .col(StockLevels::LotId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_levels_product_company")
                    .table(StockLevels::Table)
                    .col(StockLevels::ProductId)
                    .col(StockLevels::CompanyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockLevels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockLevels {
    Table,
    Id,
    ProductId,
    LocationId,
    LotId,
    Quantity,
    ReservedQuantity,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}
