use sea_orm_migration::prelude::*;

use super::m20250105_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TopArtists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopArtists::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TopArtists::UserId).string_len(255).not_null())
                    .col(ColumnDef::new(TopArtists::ArtistId).string_len(64).not_null())
                    .col(ColumnDef::new(TopArtists::ArtistName).text().not_null())
                    .col(ColumnDef::new(TopArtists::Genres).text().not_null().default(""))
                    .col(ColumnDef::new(TopArtists::TimeRange).string_len(10).not_null())
                    .col(
                        ColumnDef::new(TopArtists::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_top_artists_user_id")
                            .from(TopArtists::Table, TopArtists::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_top_artists_identity")
                    .table(TopArtists::Table)
                    .col(TopArtists::UserId)
                    .col(TopArtists::ArtistId)
                    .col(TopArtists::TimeRange)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Genre lookups during aggregation go by name
        manager
            .create_index(
                Index::create()
                    .name("idx_top_artists_artist_name")
                    .table(TopArtists::Table)
                    .col(TopArtists::ArtistName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopArtists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TopArtists {
    Table,
    Id,
    UserId,
    ArtistId,
    ArtistName,
    Genres,
    TimeRange,
    FetchedAt,
}
