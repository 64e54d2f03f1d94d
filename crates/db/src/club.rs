use diesel::prelude::*;
use serde::Serialize;

use crate::schema::clubs;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = clubs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub club_id: String,
    pub club_name: String,
    pub club_description: Option<String>,
    pub club_logo_url: Option<String>,
}
