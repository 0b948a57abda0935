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
                    .table(RecentTracks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecentTracks::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecentTracks::UserId).string_len(255).not_null())
                    .col(ColumnDef::new(RecentTracks::TrackId).string_len(64).not_null())
                    .col(ColumnDef::new(RecentTracks::TrackName).text().not_null())
                    .col(ColumnDef::new(RecentTracks::ArtistName).text().not_null())
                    .col(ColumnDef::new(RecentTracks::AlbumName).text().not_null())
                    .col(
                        ColumnDef::new(RecentTracks::PlayedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecentTracks::DurationMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecentTracks::IngestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recent_tracks_user_id")
                            .from(RecentTracks::Table, RecentTracks::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Identity key for idempotent ingestion
        manager
            .create_index(
                Index::create()
                    .name("idx_recent_tracks_identity")
                    .table(RecentTracks::Table)
                    .col(RecentTracks::UserId)
                    .col(RecentTracks::TrackId)
                    .col(RecentTracks::PlayedAt)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_recent_tracks_user_played_at")
                    .table(RecentTracks::Table)
                    .col(RecentTracks::UserId)
                    .col(RecentTracks::PlayedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecentTracks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum RecentTracks {
    Table,
    Id,
    UserId,
    TrackId,
    TrackName,
    ArtistName,
    AlbumName,
    PlayedAt,
    DurationMs,
    IngestedAt,
}
