use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockTransfers::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::Reference)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::SourceWarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::DestinationWarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::TransferDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::ExpectedArrivalDate)
                            .date()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::ActualArrivalDate)
                            .date()
                            .null(),
                    )
                    .col(ColumnDef::new(StockTransfers::Transporter).string().null())
                    .col(
                        ColumnDef::new(StockTransfers::TrackingNumber)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(StockTransfers::Notes).text().null())
                    .col(ColumnDef::new(StockTransfers::CreatedBy).uuid().not_null())
                    .col(ColumnDef::new(StockTransfers::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockTransfers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransfers::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockTransferLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockTransferLines::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferLines::TransferId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferLines::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransferLines::LotId).uuid().null())
                    .col(
                        ColumnDef::new(StockTransferLines::QuantitySent)
                            .decimal_len(12, 3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferLines::QuantityReceived)
                            .decimal_len(12, 3)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferLines::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferLines::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_transfer_lines_transfer")
                    .table(StockTransferLines::Table)
                    .col(StockTransferLines::TransferId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockTransferLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockTransfers {
    Table,
    Id,
    Reference,
    SourceWarehouseId,
    DestinationWarehouseId,
    Status,
    TransferDate,
    ExpectedArrivalDate,
    ActualArrivalDate,
    Transporter,
    TrackingNumber,
    Notes,
    CreatedBy,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StockTransferLines {
    Table,
    Id,
    TransferId,
    ProductId,
    LotId,
    QuantitySent,
    QuantityReceived,
    CreatedAt,
    UpdatedAt,
}
