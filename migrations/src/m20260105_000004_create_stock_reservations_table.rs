use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockReservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockReservations::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::LocationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockReservations::LotId).uuid().null())
                    .col(
                        ColumnDef::new(StockReservations::Quantity)
                            .decimal_len(12, 3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::ReferenceType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::ReferenceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::ReferenceLabel)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(StockReservations::ExpiryDate)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(StockReservations::Notes).text().null())
                    .col(
                        ColumnDef::new(StockReservations::ReservedBy)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::CompanyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockReservations::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_reservations_reference")
                    .table(StockReservations::Table)
                    .col(StockReservations::ReferenceType)
                    .col(StockReservations::ReferenceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_reservations_status")
                    .table(StockReservations::Table)
                    .col(StockReservations::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockReservations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockReservations {
    Table,
    Id,
    ProductId,
    LocationId,
    LotId,
    Quantity,
    ReferenceType,
    ReferenceId,
    ReferenceLabel,
    Status,
    ExpiryDate,
    Notes,
    ReservedBy,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}
