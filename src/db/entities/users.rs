use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub token_expires_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recent_tracks::Entity")]
    RecentTracks,
    #[sea_orm(has_many = "super::top_artists::Entity")]
    TopArtists,
    #[sea_orm(has_many = "super::top_tracks::Entity")]
    TopTracks,
}

impl Related<super::recent_tracks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecentTracks.def()
    }
}

impl Related<super::top_artists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TopArtists.def()
    }
}

impl Related<super::top_tracks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TopTracks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
