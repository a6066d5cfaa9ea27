use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SearchMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SearchMetrics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SearchMetrics::SearchTerm)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SearchMetrics::Count)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(SearchMetrics::MovieId).string().not_null())
                    .col(ColumnDef::new(SearchMetrics::Title).string().not_null())
                    .col(ColumnDef::new(SearchMetrics::PosterUrl).string().null())
                    .col(ColumnDef::new(SearchMetrics::CreatedAt).string().not_null())
                    .col(ColumnDef::new(SearchMetrics::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_search_metrics_count")
                    .table(SearchMetrics::Table)
                    .col(SearchMetrics::Count)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SearchMetrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SearchMetrics {
    Table,
    Id,
    SearchTerm,
    Count,
    MovieId,
    Title,
    PosterUrl,
    CreatedAt,
    UpdatedAt,
}
