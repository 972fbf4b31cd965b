use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReferenceSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferenceSequences::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceSequences::Prefix)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceSequences::Day)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceSequences::LastValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReferenceSequences::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferenceSequences::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_reference_sequences_prefix_day")
                    .table(ReferenceSequences::Table)
                    .col(ReferenceSequences::Prefix)
                    .col(ReferenceSequences::Day)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReferenceSequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReferenceSequences {
    Table,
    Id,
    Prefix,
    Day,
    LastValue,
    CreatedAt,
    UpdatedAt,
}
