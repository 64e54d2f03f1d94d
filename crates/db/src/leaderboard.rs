use diesel::prelude::*;

use crate::schema::leaderboard_entries;

text_enum! {
    pub enum CompetitorType {
        Team => "Team",
        Individual => "Individual",
    }
}

#[derive(Debug, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = leaderboard_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LeaderboardEntry {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub competitor_id: String,
    pub competitor_type: CompetitorType,
    pub marks: f64,
    pub rank: Option<i64>,
}
