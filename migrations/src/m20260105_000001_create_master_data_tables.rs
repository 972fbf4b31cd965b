use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductCategories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductCategories::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductCategories::Name).string().not_null())
                    .col(
                        ColumnDef::new(ProductCategories::Code)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductCategories::Description).text().null())
                    .col(ColumnDef::new(ProductCategories::ParentId).uuid().null())
                    .col(
                        ColumnDef::new(ProductCategories::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ProductCategories::CompanyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductCategories::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductCategories::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_product_categories_code_company")
                    .table(ProductCategories::Table)
                    .col(ProductCategories::Code)
                    .col(ProductCategories::CompanyId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Products::Sku).string_len(100).not_null())
                    .col(ColumnDef::new(Products::Barcode).string_len(100).null())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::CategoryId).uuid().null())
                    .col(
                        ColumnDef::new(Products::ProductType)
                            .string_len(20)
                            .not_null()
                            .default("stockable"),
                    )
                    .col(
                        ColumnDef::new(Products::UnitOfMeasure)
                            .string_len(20)
                            .not_null()
                            .default("pce"),
                    )
                    .col(
                        ColumnDef::new(Products::SalePrice)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::CostPrice)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::TrackingType)
                            .string_len(20)
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(Products::MinStockLevel)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::MaxStockLevel)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::ReorderPoint)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::ReorderQuantity)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::OptimalOrderQuantity)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::AverageDailyConsumption)
                            .decimal_len(12, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::AbcClassification)
                            .string_len(5)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Products::LeadTimeDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Products::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_products_sku_company")
                    .table(Products::Table)
                    .col(Products::Sku)
                    .col(Products::CompanyId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Warehouses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Warehouses::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Warehouses::Name).string().not_null())
                    .col(ColumnDef::new(Warehouses::Code).string_len(50).not_null())
                    .col(ColumnDef::new(Warehouses::Address).text().null())
                    .col(
                        ColumnDef::new(Warehouses::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Warehouses::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Warehouses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Warehouses::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_warehouses_code_company")
                    .table(Warehouses::Table)
                    .col(Warehouses::Code)
                    .col(Warehouses::CompanyId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockLocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockLocations::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLocations::WarehouseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockLocations::Name).string().not_null())
                    .col(
                        ColumnDef::new(StockLocations::Code)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockLocations::Aisle).string_len(50).null())
                    .col(ColumnDef::new(StockLocations::Shelf).string_len(50).null())
                    .col(ColumnDef::new(StockLocations::Bin).string_len(50).null())
                    .col(
                        ColumnDef::new(StockLocations::LocationType)
                            .string_len(20)
                            .not_null()
                            .default("storage"),
                    )
                    .col(
                        ColumnDef::new(StockLocations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(StockLocations::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockLocations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockLocations::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_locations_warehouse")
                    .table(StockLocations::Table)
                    .col(StockLocations::WarehouseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Lots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Lots::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Lots::ProductId).uuid().not_null())
                    .col(ColumnDef::new(Lots::LotNumber).string_len(100).not_null())
                    .col(ColumnDef::new(Lots::ExpiryDate).date().null())
                    .col(ColumnDef::new(Lots::BestBeforeDate).date().null())
                    .col(ColumnDef::new(Lots::ManufacturingDate).date().null())
                    .col(ColumnDef::new(Lots::Notes).text().null())
                    .col(
                        ColumnDef::new(Lots::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Lots::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Lots::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Lots::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_lots_number_product")
                    .table(Lots::Table)
                    .col(Lots::LotNumber)
                    .col(Lots::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockLocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Warehouses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductCategories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProductCategories {
    Table,
    Id,
    Name,
    Code,
    Description,
    ParentId,
    IsActive,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Sku,
    Barcode,
    Name,
    Description,
    CategoryId,
    ProductType,
    UnitOfMeasure,
    SalePrice,
    CostPrice,
    TrackingType,
    MinStockLevel,
    MaxStockLevel,
    ReorderPoint,
    ReorderQuantity,
    OptimalOrderQuantity,
    AverageDailyConsumption,
    AbcClassification,
    LeadTimeDays,
    IsActive,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Warehouses {
    Table,
    Id,
    Name,
    Code,
    Address,
    IsActive,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StockLocations {
    Table,
    Id,
    WarehouseId,
    Name,
    Code,
    Aisle,
    Shelf,
    Bin,
    LocationType,
    IsActive,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Lots {
    Table,
    Id,
    ProductId,
    LotNumber,
    ExpiryDate,
    BestBeforeDate,
    ManufacturingDate,
    Notes,
    IsActive,
    CompanyId,
    CreatedAt,
    UpdatedAt,
}
