use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::emails;

/// One row of the outbound mail log. Every message the mailer handles is
/// recorded here, whether or not it was relayed.
#[derive(
    Debug, Queryable, Selectable, Serialize, Deserialize, Clone, PartialEq, Eq,
)]
#[diesel(table_name = emails)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EmailRow {
    pub id: i64,
    pub message_id: String,
    pub kind: String,
    pub recipients: String,
    pub subject: String,
    pub contents: Option<String>,
    pub delivered: bool,
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
}
