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
                    .table(TopTracks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopTracks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TopTracks::UserId).string_len(255).not_null())
                    .col(ColumnDef::new(TopTracks::TrackId).string_len(64).not_null())
                    .col(ColumnDef::new(TopTracks::TrackName).text().not_null())
                    .col(ColumnDef::new(TopTracks::ArtistName).text().not_null())
                    .col(ColumnDef::new(TopTracks::AlbumName).text().not_null())
                    .col(ColumnDef::new(TopTracks::TimeRange).string_len(10).not_null())
                    .col(
                        ColumnDef::new(TopTracks::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_top_tracks_user_id")
                            .from(TopTracks::Table, TopTracks::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_top_tracks_identity")
                    .table(TopTracks::Table)
                    .col(TopTracks::UserId)
                    .col(TopTracks::TrackId)
                    .col(TopTracks::TimeRange)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopTracks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TopTracks {
    Table,
    Id,
    UserId,
    TrackId,
    TrackName,
    ArtistName,
    AlbumName,
    TimeRange,
    FetchedAt,
}
