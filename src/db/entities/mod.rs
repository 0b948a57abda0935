pub mod genre_distribution;
pub mod jobs;
pub mod recent_tracks;
pub mod top_artists;
pub mod top_tracks;
pub mod users;
pub mod weekly_distribution;

pub use genre_distribution::Entity as GenreDistribution;
pub use jobs::Entity as Job;
pub use recent_tracks::Entity as RecentTrack;
pub use top_artists::Entity as TopArtist;
pub use top_tracks::Entity as TopTrack;
pub use users::Entity as User;
pub use weekly_distribution::Entity as WeeklyDistribution;
