use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "top_artists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub artist_id: String,
    pub artist_name: String,
    /// Comma-joined, in the order the music service returned them.
    pub genres: String,
    pub time_range: String,
    pub fetched_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn genre_list(&self) -> Vec<String> {
        split_genres(&self.genres)
    }
}

pub fn join_genres(genres: &[String]) -> String {
    genres.join(",")
}

pub fn split_genres(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::UserId",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genres_keep_source_order() {
        let genres = vec!["rock".to_string(), "alt rock".to_string(), "grunge".to_string()];
        let joined = join_genres(&genres);
        assert_eq!(joined, "rock,alt rock,grunge");
        assert_eq!(split_genres(&joined), genres);
    }

    #[test]
    fn test_split_genres_skips_blanks() {
        assert_eq!(split_genres(""), Vec::<String>::new());
        assert_eq!(split_genres(" pop , ,indie"), vec!["pop", "indie"]);
    }
}
