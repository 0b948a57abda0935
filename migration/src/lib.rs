pub use sea_orm_migration::prelude::*;

mod m20250105_000001_create_users_table;
mod m20250105_000002_create_recent_tracks_table;
mod m20250105_000003_create_top_tracks_table;
mod m20250105_000004_create_top_artists_table;
mod m20250105_000005_create_distribution_tables;
mod m20250105_000006_create_jobs_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250105_000001_create_users_table::Migration),
            Box::new(m20250105_000002_create_recent_tracks_table::Migration),
            Box::new(m20250105_000003_create_top_tracks_table::Migration),
            Box::new(m20250105_000004_create_top_artists_table::Migration),
            Box::new(m20250105_000005_create_distribution_tables::Migration),
            Box::new(m20250105_000006_create_jobs_table::Migration),
        ]
    }
}
