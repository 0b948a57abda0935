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
                    .table(WeeklyDistribution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WeeklyDistribution::UserId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WeeklyDistribution::Distribution).text().not_null())
                    .col(
                        ColumnDef::new(WeeklyDistribution::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_distribution_user_id")
                            .from(WeeklyDistribution::Table, WeeklyDistribution::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GenreDistribution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GenreDistribution::UserId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GenreDistribution::Distribution).text().not_null())
                    .col(
                        ColumnDef::new(GenreDistribution::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_genre_distribution_user_id")
                            .from(GenreDistribution::Table, GenreDistribution::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GenreDistribution::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WeeklyDistribution::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum WeeklyDistribution {
    Table,
    UserId,
    Distribution,
    ComputedAt,
}

#[derive(DeriveIden)]
pub enum GenreDistribution {
    Table,
    UserId,
    Distribution,
    ComputedAt,
}
